use crate::error::{Result, WorkbookError};
use auditmap_protocol::Table;
use std::fmt;

const MAX_SHEET_NAME_CHARS: usize = 31;
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            // Whole numbers render without a trailing ".0" (12 rather than 12.0)
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value.to_string())
        }
    }
}

/// A named grid of cells
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Header row first, then one row per table row, all as text cells.
    pub fn from_table(name: impl Into<String>, table: &Table) -> Self {
        let mut rows = Vec::with_capacity(table.len() + 1);
        rows.push(table.headers.iter().map(|h| CellValue::from(h.as_str())).collect());
        for row in &table.rows {
            rows.push(row.iter().map(|c| CellValue::from(c.as_str())).collect());
        }
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Read the sheet back as a table: first row is the header, blank rows are skipped.
    pub fn to_table(&self) -> Table {
        let mut rows = self
            .rows
            .iter()
            .filter(|row| !row.iter().all(CellValue::is_empty))
            .map(|row| row.iter().map(ToString::to_string).collect::<Vec<String>>());
        let headers = rows.next().unwrap_or_default();
        let body: Vec<Vec<String>> = rows.collect();
        Table::new(headers, body)
    }
}

/// In-memory workbook: ordered sheets of cell values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
    /// `.xlsx` package the workbook was read from; patched on write
    package: Option<Vec<u8>>,
    /// Names of sheets put since loading
    touched: Vec<String>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            ..Self::default()
        }
    }

    pub(crate) fn from_package(sheets: Vec<Sheet>, package: Vec<u8>) -> Self {
        Self {
            sheets,
            package: Some(package),
            touched: Vec::new(),
        }
    }

    pub(crate) fn package(&self) -> Option<&[u8]> {
        self.package.as_deref()
    }

    /// Current contents of every sheet put since loading, in put order.
    pub(crate) fn touched_sheets(&self) -> Vec<&Sheet> {
        self.touched
            .iter()
            .filter_map(|name| self.sheet(name))
            .collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Sheet names compare case-insensitively, as in spreadsheet applications.
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.position(name).map(|idx| &self.sheets[idx])
    }

    pub fn sheet_table(&self, name: &str) -> Result<Table> {
        self.sheet(name)
            .map(Sheet::to_table)
            .ok_or_else(|| WorkbookError::MissingSheet(name.to_string()))
    }

    /// Insert `sheet`, fully replacing any sheet with the same name in place;
    /// a new name is appended after the existing sheets.
    pub fn put_sheet(&mut self, sheet: Sheet) -> Result<()> {
        validate_sheet_name(&sheet.name)?;
        let wanted = sheet.name.to_lowercase();
        if !self.touched.iter().any(|t| t.to_lowercase() == wanted) {
            self.touched.push(sheet.name.clone());
        }
        match self.position(&sheet.name) {
            Some(idx) => {
                log::debug!("Replacing sheet '{}'", sheet.name);
                self.sheets[idx] = sheet;
            }
            None => {
                log::debug!("Adding sheet '{}'", sheet.name);
                self.sheets.push(sheet);
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        self.sheets
            .iter()
            .position(|s| s.name.to_lowercase() == wanted)
    }
}

pub fn validate_sheet_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(WorkbookError::InvalidSheetName {
            name: name.to_string(),
            reason,
        })
    };
    if name.trim().is_empty() {
        return invalid("name is empty");
    }
    if name.chars().count() > MAX_SHEET_NAME_CHARS {
        return invalid("name is longer than 31 characters");
    }
    if name.contains(FORBIDDEN_SHEET_CHARS) {
        return invalid("name contains one of [ ] : * ? / \\");
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return invalid("name starts or ends with an apostrophe");
    }
    Ok(())
}
