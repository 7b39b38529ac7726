use crate::columns::{self, cell};
use crate::error::{Result, TaxonomyFormatError};
use crate::LoadWarning;
use auditmap_protocol::{Table, TestRecord};
use std::collections::HashMap;

/// Canonical test list keyed by description.
///
/// Candidates keep first-seen order (the fuzzy tie-break depends on it), while
/// a repeated description overwrites the reference ID of the earlier entry.
#[derive(Debug, Clone, Default)]
pub struct TestTable {
    records: Vec<TestRecord>,
    by_description: HashMap<String, usize>,
}

impl TestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: TestRecord) {
        match self.by_description.get(&record.test_description) {
            Some(&idx) => {
                let existing = &mut self.records[idx];
                if existing.test_reference_id != record.test_reference_id {
                    log::debug!(
                        "Test '{}' redefined: {} -> {}",
                        record.test_description,
                        existing.test_reference_id,
                        record.test_reference_id
                    );
                }
                existing.test_reference_id = record.test_reference_id;
            }
            None => {
                self.by_description
                    .insert(record.test_description.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Exact lookup by description (case-sensitive).
    pub fn get(&self, description: &str) -> Option<&TestRecord> {
        self.by_description
            .get(description)
            .map(|&idx| &self.records[idx])
    }

    /// Fuzzy candidate pool, in first-seen order.
    pub fn candidates(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<TestRecord> for TestTable {
    fn from_iter<I: IntoIterator<Item = TestRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

/// Parse the test-reference table (usually the workbook's `Tests` sheet).
pub fn load_tests(table: &Table) -> Result<(TestTable, Vec<LoadWarning>)> {
    let ref_col = table.column(columns::TEST_REFERENCE_ID).ok_or_else(|| {
        TaxonomyFormatError::missing_column("test reference", "Reference ID", &table.headers)
    })?;
    let desc_col = table.column(columns::TEST_DESCRIPTION).ok_or_else(|| {
        TaxonomyFormatError::missing_column("test reference", "Test", &table.headers)
    })?;

    let mut tests = TestTable::new();
    let mut warnings = Vec::new();

    for row in 0..table.len() {
        let reference = cell(table, row, Some(ref_col));
        let description = cell(table, row, Some(desc_col));
        let (Some(test_reference_id), Some(test_description)) = (reference, description) else {
            let warning =
                LoadWarning::dropped("test reference", row, "missing Reference ID or Test");
            log::warn!("{warning}");
            warnings.push(warning);
            continue;
        };
        tests.insert(TestRecord {
            test_reference_id,
            test_description,
        });
    }

    log::info!("Loaded {} tests ({} dropped)", tests.len(), warnings.len());
    Ok((tests, warnings))
}
