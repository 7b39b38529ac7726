use crate::config::MatchConfig;
use crate::error::{ReconciliationInputError, Result};
use crate::fuzzy::FuzzyMatcher;
use auditmap_protocol::{
    ControlRecord, EvidenceFileEntry, EvidenceSourceRecord, MappingRow, MatchKind,
};
use auditmap_taxonomy::{ControlTable, Taxonomy, TestTable};
use serde::Serialize;
use std::collections::HashSet;

/// Counters for one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub files: usize,
    pub rows: usize,
    pub exact_control_rows: usize,
    pub exact_test_rows: usize,
    pub fuzzy_rows: usize,
    pub unmatched_rows: usize,
    pub duplicates_removed: usize,
}

impl ReconcileStats {
    fn count(&mut self, row: &MappingRow) {
        self.rows += 1;
        match row.match_kind {
            MatchKind::ExactControl => self.exact_control_rows += 1,
            MatchKind::ExactTest => self.exact_test_rows += 1,
            MatchKind::Fuzzy => self.fuzzy_rows += 1,
            MatchKind::Unmatched => self.unmatched_rows += 1,
        }
    }
}

/// The unified, deduplicated mapping table
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    pub rows: Vec<MappingRow>,
    pub stats: ReconcileStats,
}

/// Maps evidence files to controls and tests.
///
/// Precedence per file: exact control ID on the folder name, then exact test
/// description, then the best fuzzy description match. A file that clears no
/// tier is still emitted, unmatched.
pub struct Reconciler<'a> {
    config: MatchConfig,
    controls: &'a ControlTable,
    tests: &'a TestTable,
    fuzzy: FuzzyMatcher,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: MatchConfig, taxonomy: &'a Taxonomy) -> Result<Self> {
        Self::with_tables(config, &taxonomy.controls, &taxonomy.tests)
    }

    pub fn with_tables(
        config: MatchConfig,
        controls: &'a ControlTable,
        tests: &'a TestTable,
    ) -> Result<Self> {
        config.validate()?;
        let fuzzy = FuzzyMatcher::new(&config);
        Ok(Self {
            config,
            controls,
            tests,
            fuzzy,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Reconcile every file; `evidence` is only consulted for evidence-ID tagging.
    pub fn reconcile(
        &self,
        files: &[EvidenceFileEntry],
        evidence: &[EvidenceSourceRecord],
    ) -> Result<Reconciliation> {
        self.check_candidates(files.len())?;

        let mut out = Reconciliation::default();
        out.stats.files = files.len();
        let mut seen: HashSet<Vec<String>> = HashSet::new();

        for entry in files {
            for mut row in self.match_entry(entry) {
                if self.config.match_evidence_ids {
                    row.evidence_id = evidence_id_for(&entry.filename, evidence);
                }
                if !seen.insert(row.cells()) {
                    out.stats.duplicates_removed += 1;
                    continue;
                }
                out.stats.count(&row);
                out.rows.push(row);
            }
        }

        log::info!(
            "Reconciled {} files into {} rows: {} control, {} test, {} fuzzy, {} unmatched ({} duplicates removed)",
            out.stats.files,
            out.stats.rows,
            out.stats.exact_control_rows,
            out.stats.exact_test_rows,
            out.stats.fuzzy_rows,
            out.stats.unmatched_rows,
            out.stats.duplicates_removed
        );
        Ok(out)
    }

    fn check_candidates(&self, files: usize) -> Result<()> {
        if files == 0 || !self.tests.is_empty() {
            return Ok(());
        }
        if !self.config.use_control_taxonomy {
            return Err(ReconciliationInputError::EmptyCandidatePool {
                files,
                reason: "control layer is disabled and the test table is empty",
            });
        }
        if self.controls.is_empty() {
            return Err(ReconciliationInputError::EmptyCandidatePool {
                files,
                reason: "control and test tables are both empty",
            });
        }
        Ok(())
    }

    fn match_entry(&self, entry: &EvidenceFileEntry) -> Vec<MappingRow> {
        let folder = entry.containing_folder.trim();
        if folder.is_empty() {
            log::debug!("{}: at archive root, left unmatched", entry.relative_path);
            return vec![MappingRow::unmatched(entry.clone())];
        }

        if self.config.use_control_taxonomy {
            if let Some(controls) = self.controls.get(folder) {
                log::debug!(
                    "{}: control '{folder}' ({} rows)",
                    entry.relative_path,
                    controls.len()
                );
                return controls
                    .iter()
                    .map(|control| self.control_row(entry, control))
                    .collect();
            }
        }

        if let Some(test) = self.tests.get(folder) {
            log::debug!("{}: test '{folder}'", entry.relative_path);
            let mut row = MappingRow::unmatched(entry.clone());
            row.match_kind = MatchKind::ExactTest;
            row.matched_test_name = Some(test.test_description.clone());
            row.matched_test_reference_id = Some(test.test_reference_id.clone());
            return vec![row];
        }

        if self.config.fuzzy_fallback {
            if let Some(found) = self.fuzzy.best_match(folder, self.tests.candidates()) {
                log::debug!(
                    "{}: fuzzy '{folder}' -> '{}' ({:.3})",
                    entry.relative_path,
                    found.test.test_description,
                    found.score
                );
                let mut row = MappingRow::unmatched(entry.clone());
                row.match_kind = MatchKind::Fuzzy;
                row.matched_test_name = Some(found.test.test_description.clone());
                row.matched_test_reference_id = Some(found.test.test_reference_id.clone());
                row.similarity = Some(found.score);
                return vec![row];
            }
        }

        log::debug!("{}: no match for '{folder}'", entry.relative_path);
        vec![MappingRow::unmatched(entry.clone())]
    }

    fn control_row(&self, entry: &EvidenceFileEntry, control: &ControlRecord) -> MappingRow {
        let test_reference_id = self
            .tests
            .get(control.test_name.trim())
            .map(|test| test.test_reference_id.clone());

        MappingRow {
            entry: entry.clone(),
            matched_control_id: Some(control.control_id.clone()),
            matched_test_name: Some(control.test_name.clone()),
            matched_test_reference_id: test_reference_id,
            framework_requirement: control.framework_requirement.clone(),
            url: control.url.clone(),
            match_kind: MatchKind::ExactControl,
            similarity: None,
            evidence_id: None,
        }
    }
}

fn evidence_id_for(filename: &str, evidence: &[EvidenceSourceRecord]) -> Option<String> {
    evidence
        .iter()
        .map(|record| record.evidence_id.trim())
        .find(|id| !id.is_empty() && filename.contains(id))
        .map(str::to_string)
}
