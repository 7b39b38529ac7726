use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconciliationInputError>;

#[derive(Error, Debug, PartialEq)]
pub enum ReconciliationInputError {
    /// No active matching tier has anything to match against
    #[error(
        "No match candidates: {files} evidence files but the {reason}; \
         supply a control mapping or a test reference table"
    )]
    EmptyCandidatePool { files: usize, reason: &'static str },

    #[error("Invalid similarity threshold {0}: must be within [0, 1]")]
    InvalidThreshold(f64),
}
