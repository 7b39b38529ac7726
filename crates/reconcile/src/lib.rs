//! # auditmap reconcile
//!
//! Joins the evidence file inventory to the control/test taxonomy.
//!
//! ## Precedence
//!
//! ```text
//! containing folder (trimmed)
//!     │
//!     ├──> control ID exact match ──> one row per control row (fan-out),
//!     │                               test reference resolved by test name
//!     ├──> test description exact match
//!     ├──> fuzzy: best description with similarity >= threshold
//!     └──> unmatched row
//! ```
//!
//! Output rows identical on every column are collapsed to one.
//!
//! ## Example
//!
//! ```rust
//! use auditmap_protocol::{ControlRecord, EvidenceFileEntry, TestRecord};
//! use auditmap_reconcile::{MatchConfig, Reconciler};
//! use auditmap_taxonomy::Taxonomy;
//!
//! let taxonomy = Taxonomy {
//!     controls: [ControlRecord::new("ACME", "Access review")].into_iter().collect(),
//!     tests: [TestRecord::new("T12", "Access review")].into_iter().collect(),
//!     warnings: Vec::new(),
//! };
//! let files = [EvidenceFileEntry::new("evidence1.pdf", "ACME/evidence1.pdf", "ACME")];
//!
//! let out = Reconciler::new(MatchConfig::default(), &taxonomy)?.reconcile(&files, &[])?;
//! assert_eq!(out.rows[0].matched_test_reference_id.as_deref(), Some("T12"));
//! # Ok::<(), auditmap_reconcile::ReconciliationInputError>(())
//! ```

mod config;
mod engine;
mod error;
mod fuzzy;
mod similarity;

pub use config::{MatchConfig, SimilarityMetric, TieBreak, DEFAULT_THRESHOLD};
pub use engine::{ReconcileStats, Reconciler, Reconciliation};
pub use error::{ReconciliationInputError, Result};
pub use fuzzy::{FuzzyMatch, FuzzyMatcher};
pub use similarity::sequence_ratio;
