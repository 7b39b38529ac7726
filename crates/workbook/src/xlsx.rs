//! `.xlsx` conversion for [`Workbook`].
//!
//! A workbook read from `.xlsx` is written back by patching its source package
//! (see [`crate::package`]), so sheets that were not put keep their formulas,
//! styles and charts. A workbook built in memory is written from scratch.

use crate::error::{Result, WorkbookError};
use crate::model::{CellValue, Sheet, Workbook};
use crate::package;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;

const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

impl Workbook {
    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self> {
        let mut xlsx: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;

        let mut sheets = Vec::new();
        for name in xlsx.sheet_names() {
            let range = xlsx.worksheet_range(&name)?;
            // calamine trims leading empty rows/columns; restore absolute positions
            let (row_offset, col_offset) = range
                .start()
                .map(|(r, c)| (r as usize, c as usize))
                .unwrap_or_default();

            let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
            for row in range.rows() {
                let mut cells = vec![CellValue::Empty; col_offset];
                cells.extend(row.iter().map(cell_value));
                rows.push(cells);
            }
            sheets.push(Sheet { name, rows });
        }

        log::debug!("Read workbook with {} sheets", sheets.len());
        Ok(Self::from_package(sheets, bytes.to_vec()))
    }

    pub fn from_xlsx_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_xlsx_bytes(&bytes)
    }

    /// Serialize the workbook to `.xlsx` bytes.
    ///
    /// With a source package only the sheets put since loading are rewritten;
    /// otherwise every sheet is written, in order.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        if let Some(source) = self.package() {
            let touched = self.touched_sheets();
            if touched.is_empty() {
                return Ok(source.to_vec());
            }
            for sheet in &touched {
                check_size(sheet)?;
            }
            return package::patch(source, &touched);
        }

        let mut out = rust_xlsxwriter::Workbook::new();

        for sheet in self.sheets() {
            check_size(sheet)?;

            let worksheet = out.add_worksheet();
            worksheet.set_name(&sheet.name)?;
            for (r, row) in sheet.rows.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    let (r, c) = (r as u32, c as u16);
                    match cell {
                        CellValue::Empty => {}
                        CellValue::Text(s) => {
                            worksheet.write_string(r, c, s)?;
                        }
                        CellValue::Number(n) => {
                            worksheet.write_number(r, c, *n)?;
                        }
                        CellValue::Bool(b) => {
                            worksheet.write_boolean(r, c, *b)?;
                        }
                    }
                }
            }
        }

        Ok(out.save_to_buffer()?)
    }
}

fn check_size(sheet: &Sheet) -> Result<()> {
    let width = sheet.rows.iter().map(Vec::len).max().unwrap_or(0);
    if sheet.rows.len() > MAX_ROWS || width > MAX_COLS {
        return Err(WorkbookError::TooLarge {
            sheet: sheet.name.clone(),
            rows: sheet.rows.len(),
            cols: width,
        });
    }
    Ok(())
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            CellValue::from(s.as_str())
        }
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditmap_protocol::Table;
    use pretty_assertions::assert_eq;

    #[test]
    fn xlsx_round_trip_keeps_values_and_order() {
        let tests = Table::new(
            vec!["Reference ID".into(), "Test".into()],
            vec![vec!["T12".into(), "Access review".into()]],
        );
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet::from_table("Tests", &tests)).unwrap();
        wb.put_sheet(Sheet {
            name: "Numbers".into(),
            rows: vec![vec![CellValue::Number(3.0), CellValue::Bool(false)]],
        })
        .unwrap();

        let bytes = wb.to_xlsx_bytes().unwrap();
        let back = Workbook::from_xlsx_bytes(&bytes).unwrap();

        assert_eq!(back.sheet_names(), vec!["Tests", "Numbers"]);
        assert_eq!(back.sheet_table("Tests").unwrap(), tests);
        assert_eq!(
            back.sheet("Numbers").unwrap().rows,
            vec![vec![CellValue::Number(3.0), CellValue::Bool(false)]]
        );
    }

    #[test]
    fn leading_blank_rows_and_columns_are_preserved() {
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet {
            name: "Offset".into(),
            rows: vec![vec![], vec![CellValue::Empty, "B2".into()]],
        })
        .unwrap();

        let back = Workbook::from_xlsx_bytes(&wb.to_xlsx_bytes().unwrap()).unwrap();
        let rows = &back.sheet("Offset").unwrap().rows;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![CellValue::Empty, CellValue::Text("B2".into())]);
    }

    #[test]
    fn reads_workbook_from_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("audit.xlsx");
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet::from_table("Tests", &Table::default()))
            .unwrap();
        std::fs::write(&path, wb.to_xlsx_bytes().unwrap()).unwrap();

        let back = Workbook::from_xlsx_path(&path).unwrap();
        assert_eq!(back.sheet_names(), vec!["Tests"]);
    }

    #[test]
    fn unchanged_workbook_is_written_back_as_read() {
        let mut wb = Workbook::new();
        wb.put_sheet(Sheet::from_table("Tests", &Table::default()))
            .unwrap();
        let bytes = wb.to_xlsx_bytes().unwrap();

        let loaded = Workbook::from_xlsx_bytes(&bytes).unwrap();
        assert_eq!(loaded.to_xlsx_bytes().unwrap(), bytes);
    }

    #[test]
    fn garbage_bytes_are_a_read_error() {
        assert!(matches!(
            Workbook::from_xlsx_bytes(b"not a workbook"),
            Err(WorkbookError::Read(_))
        ));
    }
}
