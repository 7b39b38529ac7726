use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaxonomyFormatError>;

#[derive(Error, Debug)]
pub enum TaxonomyFormatError {
    /// A required column is absent from the header row
    #[error("{table} table is missing required column '{column}' (found: {found})")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
        found: String,
    },
}

impl TaxonomyFormatError {
    pub(crate) fn missing_column(
        table: &'static str,
        column: &'static str,
        headers: &[String],
    ) -> Self {
        Self::MissingColumn {
            table,
            column,
            found: headers.join(", "),
        }
    }
}
