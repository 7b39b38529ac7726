//! # auditmap indexer
//!
//! Turns an evidence archive into a flat file inventory.
//!
//! ```text
//! evidence.zip ──> extract_zip ──> directory tree ──> ArchiveIndexer ──> EvidenceFileEntry[]
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use auditmap_indexer::ArchiveIndexer;
//!
//! let index = ArchiveIndexer::new("/tmp/evidence/_unzipped").index()?;
//! for entry in &index.entries {
//!     println!("{} -> {}", entry.containing_folder, entry.relative_path);
//! }
//! # Ok::<(), auditmap_indexer::ArchiveReadError>(())
//! ```

mod error;
mod extract;
mod scanner;

pub use error::{ArchiveReadError, Result};
pub use extract::extract_zip;
pub use scanner::{ArchiveIndex, ArchiveIndexer, IndexWarning};
