//! # auditmap protocol
//!
//! Data model shared by every stage of the evidence mapping pipeline.
//!
//! ```text
//! Archive Indexer ──> EvidenceFileEntry ─┐
//! Taxonomy Loader ──> ControlRecord      ├──> Reconciliation ──> MappingRow ──> Report Sink
//!                     TestRecord         │
//! Evidence Loader ──> EvidenceSourceRecord ┘
//! ```
//!
//! Tabular inputs (CSV files and workbook sheets) share one shape, [`Table`],
//! so loaders never care where a table came from.

mod header;
mod mapping;
mod records;
mod table;

pub use header::{is_missing_value, normalize_header};
pub use mapping::{MappingColumn, MappingRow, MatchKind};
pub use records::{ControlRecord, EvidenceFileEntry, EvidenceSourceRecord, TestRecord};
pub use table::{Table, TableError};
