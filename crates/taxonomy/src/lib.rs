//! # auditmap taxonomy
//!
//! Loads the control-mapping table and the test-reference table into the two
//! read-only lookups the reconciliation engine consumes:
//!
//! - [`ControlTable`]: control ID → every control row for it
//! - [`TestTable`]: test description → test reference ID (also the fuzzy pool)
//!
//! Header spelling is resolved here, so downstream code never branches on it.

mod columns;
mod controls;
mod error;
mod test_refs;

pub use columns::{
    CONTROL_ID, CONTROL_TEST_NAME, FRAMEWORK_REQUIREMENT, TEST_DESCRIPTION, TEST_REFERENCE_ID,
    URL,
};
pub use controls::{load_controls, ControlTable};
pub use error::{Result, TaxonomyFormatError};
pub use test_refs::{load_tests, TestTable};

use auditmap_protocol::Table;
use serde::Serialize;
use std::fmt;

/// A taxonomy row that was dropped instead of failing the load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    pub table: &'static str,
    /// Spreadsheet row number (header is row 1)
    pub row: usize,
    pub reason: String,
}

impl LoadWarning {
    pub(crate) fn dropped(table: &'static str, data_row: usize, reason: &str) -> Self {
        Self {
            table,
            row: data_row + 2,
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dropped {} row {}: {}",
            self.table, self.row, self.reason
        )
    }
}

/// Both lookup tables plus whatever was dropped while building them
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    pub controls: ControlTable,
    pub tests: TestTable,
    pub warnings: Vec<LoadWarning>,
}

impl Taxonomy {
    /// Load whichever layers are supplied; an absent layer stays empty.
    pub fn load(controls: Option<&Table>, tests: Option<&Table>) -> Result<Self> {
        let mut taxonomy = Self::default();

        if let Some(table) = controls {
            let (controls, warnings) = load_controls(table)?;
            taxonomy.controls = controls;
            taxonomy.warnings.extend(warnings);
        }
        if let Some(table) = tests {
            let (tests, warnings) = load_tests(table)?;
            taxonomy.tests = tests;
            taxonomy.warnings.extend(warnings);
        }

        Ok(taxonomy)
    }
}
