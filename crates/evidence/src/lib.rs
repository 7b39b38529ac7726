//! # auditmap evidence
//!
//! Loads the evidence source's records, either from a tabular export or by
//! walking the auditor API's cursor-paginated listings.
//!
//! ```text
//! evidence.csv ─────────────> load_from_table ─┐
//!                                              ├──> EvidenceSet
//! AuditorClient ─> ApiListing ─> fetch_all ────┘   (load_from_json)
//! ```
//!
//! A failed page aborts the whole load: a partial evidence set would silently
//! under-report coverage.

mod client;
mod config;
mod error;
mod record_set;
mod source;

pub use client::{ApiListing, AuditorClient, TokenCache, TOKEN_REFRESH_MARGIN};
pub use config::{
    SourceConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, ENV_AUTH_URL, ENV_BASE_URL, ENV_CLIENT_ID,
    ENV_CLIENT_SECRET, ENV_ORG_SLUG,
};
pub use error::{EvidenceSourceError, Result};
pub use record_set::{
    load_from_json, load_from_table, EvidenceSet, DOWNLOAD_FILENAME, DOWNLOAD_LINK_KEYS,
    DOWNLOAD_URL, EVIDENCE_ID_COLUMN, HAS_DOWNLOAD_LINK,
};
pub use source::{fetch_all, load_paginated, EvidencePage, EvidenceSource};
