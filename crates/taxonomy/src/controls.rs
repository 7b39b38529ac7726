use crate::columns::{self, cell};
use crate::error::{Result, TaxonomyFormatError};
use crate::LoadWarning;
use auditmap_protocol::{ControlRecord, Table};
use std::collections::HashMap;

/// Control rows grouped by control ID.
///
/// One control may map to several tests, so every row is kept. Group order and
/// row order inside a group follow the input.
#[derive(Debug, Clone, Default)]
pub struct ControlTable {
    groups: Vec<(String, Vec<ControlRecord>)>,
    by_id: HashMap<String, usize>,
}

impl ControlTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ControlRecord) {
        match self.by_id.get(&record.control_id) {
            Some(&idx) => self.groups[idx].1.push(record),
            None => {
                self.by_id.insert(record.control_id.clone(), self.groups.len());
                self.groups.push((record.control_id.clone(), vec![record]));
            }
        }
    }

    /// All rows for a control ID (exact, case-sensitive).
    pub fn get(&self, control_id: &str) -> Option<&[ControlRecord]> {
        self.by_id.get(control_id).map(|&idx| self.groups[idx].1.as_slice())
    }

    /// Number of distinct control IDs
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of control rows across all groups
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|(_, rows)| rows.len()).sum()
    }
}

impl FromIterator<ControlRecord> for ControlTable {
    fn from_iter<I: IntoIterator<Item = ControlRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

/// Parse the control-mapping table.
///
/// Rows without a control ID or test name are dropped and reported as
/// warnings; a missing required column is an error.
pub fn load_controls(table: &Table) -> Result<(ControlTable, Vec<LoadWarning>)> {
    let id_col = table.column(columns::CONTROL_ID).ok_or_else(|| {
        TaxonomyFormatError::missing_column("control mapping", "ID", &table.headers)
    })?;
    let test_col = table.column(columns::CONTROL_TEST_NAME).ok_or_else(|| {
        TaxonomyFormatError::missing_column("control mapping", "Test name", &table.headers)
    })?;
    let framework_col = table.column(columns::FRAMEWORK_REQUIREMENT);
    let url_col = table.column(columns::URL);

    let mut controls = ControlTable::new();
    let mut warnings = Vec::new();

    for row in 0..table.len() {
        let control_id = cell(table, row, Some(id_col));
        let test_name = cell(table, row, Some(test_col));
        let (Some(control_id), Some(test_name)) = (control_id, test_name) else {
            let warning = LoadWarning::dropped("control mapping", row, "missing ID or Test name");
            log::warn!("{warning}");
            warnings.push(warning);
            continue;
        };

        controls.insert(ControlRecord {
            control_id,
            test_name,
            framework_requirement: cell(table, row, framework_col),
            url: cell(table, row, url_col),
        });
    }

    log::info!(
        "Loaded {} control rows for {} controls ({} dropped)",
        controls.row_count(),
        controls.len(),
        warnings.len()
    );
    Ok((controls, warnings))
}
