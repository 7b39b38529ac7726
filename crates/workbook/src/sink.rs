use crate::error::{Result, WorkbookError};
use crate::model::{validate_sheet_name, Sheet, Workbook};
use auditmap_protocol::{MappingColumn, MappingRow, Table};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ALL_EVIDENCE_SHEET: &str = "all-evidence-vanta";
pub const DEFAULT_EVIDENCE_INDEX_SHEET: &str = "evidence-index";

/// Destination that accepts whole-sheet replacements.
pub trait ReportSink {
    /// Replace (never append to) the named sheet with `table`.
    fn replace_sheet(&mut self, name: &str, table: &Table) -> Result<()>;

    /// Serialized payload for delivery.
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

impl ReportSink for Workbook {
    fn replace_sheet(&mut self, name: &str, table: &Table) -> Result<()> {
        self.put_sheet(Sheet::from_table(name, table))
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_xlsx_bytes()
    }
}

/// Names of the two views the report writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSheets {
    pub all_evidence: String,
    pub evidence_index: String,
}

impl Default for ReportSheets {
    fn default() -> Self {
        Self {
            all_evidence: DEFAULT_ALL_EVIDENCE_SHEET.to_string(),
            evidence_index: DEFAULT_EVIDENCE_INDEX_SHEET.to_string(),
        }
    }
}

impl ReportSheets {
    pub fn validate(&self) -> Result<()> {
        validate_sheet_name(&self.all_evidence)?;
        validate_sheet_name(&self.evidence_index)?;
        if self.all_evidence.to_lowercase() == self.evidence_index.to_lowercase() {
            return Err(WorkbookError::InvalidSheetName {
                name: self.evidence_index.clone(),
                reason: "evidence index and all-evidence sheets must differ",
            });
        }
        Ok(())
    }
}

/// The mapping view: declared header order, one row per mapping row.
pub fn mapping_table(rows: &[MappingRow]) -> Table {
    Table::new(
        MappingColumn::headers(),
        rows.iter().map(MappingRow::cells).collect(),
    )
}

/// Replace both report views and return the serialized workbook.
///
/// Running it again with the same inputs yields the same two views.
pub fn write_report(
    sink: &mut dyn ReportSink,
    rows: &[MappingRow],
    evidence: &Table,
    sheets: &ReportSheets,
) -> Result<Vec<u8>> {
    sheets.validate()?;
    sink.replace_sheet(&sheets.all_evidence, evidence)?;
    sink.replace_sheet(&sheets.evidence_index, &mapping_table(rows))?;
    log::info!(
        "Wrote {} evidence records to '{}' and {} mapping rows to '{}'",
        evidence.len(),
        sheets.all_evidence,
        rows.len(),
        sheets.evidence_index
    );
    sink.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditmap_protocol::{EvidenceFileEntry, MatchKind};
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn mapping() -> Vec<MappingRow> {
        let mut matched = MappingRow::unmatched(EvidenceFileEntry::new(
            "evidence1.pdf",
            "ACME/evidence1.pdf",
            "ACME",
        ));
        matched.match_kind = MatchKind::ExactControl;
        matched.matched_control_id = Some("ACME".into());
        matched.matched_test_name = Some("Access review".into());
        matched.matched_test_reference_id = Some("T12".into());

        let unmatched =
            MappingRow::unmatched(EvidenceFileEntry::new("doc.txt", "XYZ/doc.txt", "XYZ"));
        vec![matched, unmatched]
    }

    fn evidence() -> Table {
        Table::new(
            vec!["evidenceId".into(), "Evidence type".into()],
            vec![vec!["ev-1".into(), "Document".into()]],
        )
    }

    fn seeded_workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet::from_table(
            "Tests",
            &Table::new(vec!["Reference ID".into(), "Test".into()], vec![]),
        ))
        .unwrap();
        wb.put_sheet(Sheet::from_table(
            DEFAULT_EVIDENCE_INDEX_SHEET,
            &Table::new(vec!["stale".into()], vec![vec!["old".into()]]),
        ))
        .unwrap();
        wb
    }

    #[test]
    fn writes_both_views_with_fixed_columns() {
        let mut wb = seeded_workbook();

        write_report(&mut wb, &mapping(), &evidence(), &ReportSheets::default()).unwrap();

        assert_eq!(
            wb.sheet_names(),
            vec!["Tests", DEFAULT_EVIDENCE_INDEX_SHEET, DEFAULT_ALL_EVIDENCE_SHEET]
        );
        assert_eq!(wb.sheet_table(DEFAULT_ALL_EVIDENCE_SHEET).unwrap(), evidence());

        let index = wb.sheet_table(DEFAULT_EVIDENCE_INDEX_SHEET).unwrap();
        assert_eq!(index.headers, MappingColumn::headers());
        assert_eq!(index.len(), 2);
        assert_eq!(index.rows[0][0], "evidence1.pdf");
        assert_eq!(index.rows[0][3], "ACME");
        assert_eq!(index.rows[0][5], "T12");
        assert_eq!(index.rows[1][8], "unmatched");
    }

    #[test]
    fn rerunning_replaces_instead_of_appending() {
        let mut wb = seeded_workbook();
        let sheets = ReportSheets::default();

        write_report(&mut wb, &mapping(), &evidence(), &sheets).unwrap();
        let first = wb.clone();
        let bytes = write_report(&mut wb, &mapping(), &evidence(), &sheets).unwrap();

        assert_eq!(wb, first);

        let reread = Workbook::from_xlsx_bytes(&bytes).unwrap();
        assert_eq!(
            reread.sheet_table(DEFAULT_EVIDENCE_INDEX_SHEET).unwrap(),
            first.sheet_table(DEFAULT_EVIDENCE_INDEX_SHEET).unwrap()
        );
        assert_eq!(reread.sheets().len(), 3);
    }

    /// Audit workbook with a hand-built summary next to a stale index.
    fn workbook_with_summary_sheet() -> Vec<u8> {
        let mut source = rust_xlsxwriter::Workbook::new();
        let date = rust_xlsxwriter::Format::new().set_num_format("yyyy-mm-dd");

        let summary = source.add_worksheet();
        summary.set_name("Summary").unwrap();
        summary.write_string(0, 0, "Total").unwrap();
        summary.write_formula(0, 1, "=SUM(2,3)").unwrap();
        summary.write_number_with_format(1, 0, 45000.0, &date).unwrap();

        let index = source.add_worksheet();
        index.set_name(DEFAULT_EVIDENCE_INDEX_SHEET).unwrap();
        index.write_string(0, 0, "stale").unwrap();

        source.save_to_buffer().unwrap()
    }

    #[test]
    fn unrelated_sheets_keep_formulas_and_date_formats() {
        let source = workbook_with_summary_sheet();
        let mut wb = Workbook::from_xlsx_bytes(&source).unwrap();

        let bytes =
            write_report(&mut wb, &mapping(), &evidence(), &ReportSheets::default()).unwrap();

        let mut xlsx: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(
            xlsx.sheet_names(),
            vec!["Summary", DEFAULT_EVIDENCE_INDEX_SHEET, DEFAULT_ALL_EVIDENCE_SHEET]
        );
        let formulas = xlsx.worksheet_formula("Summary").unwrap();
        assert_eq!(formulas.get_value((0, 1)).map(String::as_str), Some("SUM(2,3)"));
        let values = xlsx.worksheet_range("Summary").unwrap();
        assert!(
            matches!(values.get_value((1, 0)), Some(Data::DateTime(_))),
            "{:?}",
            values.get_value((1, 0))
        );

        let reread = Workbook::from_xlsx_bytes(&bytes).unwrap();
        assert_eq!(reread.sheet_table(DEFAULT_ALL_EVIDENCE_SHEET).unwrap(), evidence());
        let index = reread.sheet_table(DEFAULT_EVIDENCE_INDEX_SHEET).unwrap();
        assert_eq!(index.headers, MappingColumn::headers());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn same_names_for_both_views_are_rejected() {
        let sheets = ReportSheets {
            all_evidence: "Report".into(),
            evidence_index: "report".into(),
        };
        let mut wb = Workbook::new();
        assert!(write_report(&mut wb, &[], &Table::default(), &sheets).is_err());
        assert!(wb.sheets().is_empty());
    }
}
