//! # auditmap workbook
//!
//! Report sink for the audit workbook: read an existing `.xlsx`, replace the
//! two generated views, and hand back the serialized bytes.
//!
//! ```text
//! workbook.xlsx ──calamine──> Workbook (ordered sheets)
//!                                 │ replace "all-evidence-vanta"
//!                                 │ replace "evidence-index"
//!                                 v
//!        source package ──zip + quick-xml──> bytes
//! ```
//!
//! Only the two replaced sheet parts are regenerated; every other part of the
//! source package, formulas and styles included, is copied through. A
//! workbook built in memory is written with rust_xlsxwriter.

mod error;
mod model;
mod package;
mod sink;
mod xlsx;

pub use error::{Result, WorkbookError};
pub use model::{validate_sheet_name, CellValue, Sheet, Workbook};
pub use sink::{
    mapping_table, write_report, ReportSheets, ReportSink, DEFAULT_ALL_EVIDENCE_SHEET,
    DEFAULT_EVIDENCE_INDEX_SHEET,
};
