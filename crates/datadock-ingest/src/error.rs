use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid inbox path: {0}")]
    InvalidPath(String),

    #[error("Scan task failed: {0}")]
    Task(String),
}
