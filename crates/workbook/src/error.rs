use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkbookError>;

#[derive(Error, Debug)]
pub enum WorkbookError {
    #[error("Failed to read workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("Failed to write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("Invalid sheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    #[error("Workbook has no sheet named '{0}'")]
    MissingSheet(String),

    #[error("Sheet '{sheet}' is too large to write ({rows} rows x {cols} columns)")]
    TooLarge {
        sheet: String,
        rows: usize,
        cols: usize,
    },

    #[error("Failed to patch workbook package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error("Malformed workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed workbook package: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
