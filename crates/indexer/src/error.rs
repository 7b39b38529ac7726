use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveReadError>;

#[derive(Error, Debug)]
pub enum ArchiveReadError {
    #[error("Archive root does not exist: {0}")]
    MissingRoot(String),

    #[error("Archive root is not a directory: {0}")]
    NotADirectory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error in {path}: {source}")]
    Zip {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
}
