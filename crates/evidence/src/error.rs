use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvidenceSourceError>;

#[derive(Error, Debug)]
pub enum EvidenceSourceError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Pagination error: {0}")]
    Pagination(String),

    #[error("Evidence export is missing an evidence ID column (found: {0})")]
    MissingColumn(String),

    #[error("Invalid evidence record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvidenceSourceError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub(crate) fn pagination(msg: impl Into<String>) -> Self {
        Self::Pagination(msg.into())
    }
}
