use arrow::error::ArrowError;
use datadock_core::AppError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Reader and normalizer errors
#[derive(Debug, Error)]
pub enum TableError {
    /// Undetectable encoding/delimiter, corrupt workbook, malformed payload
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Columnar cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// The Parquet backend cannot encode/decode with the configured settings
    #[error("Cache backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Cache arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl From<TableError> for AppError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Parse(msg) => AppError::Parse(msg),
            TableError::UnsupportedFormat(msg) => AppError::Parse(format!("unsupported format: {}", msg)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::BackendUnavailable(reason) => AppError::CacheBackendUnavailable(reason),
            CacheError::Table(table) => table.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_mapping() {
        assert!(matches!(
            AppError::from(TableError::Parse("undetectable format".into())),
            AppError::Parse(_)
        ));
        assert!(matches!(
            AppError::from(CacheError::BackendUnavailable("zstd level 99".into())),
            AppError::CacheBackendUnavailable(_)
        ));
        assert!(matches!(
            AppError::from(CacheError::Table(TableError::UnsupportedFormat("txt".into()))),
            AppError::Parse(_)
        ));
        assert!(matches!(
            AppError::from(CacheError::Io(std::io::Error::other("disk"))),
            AppError::Internal(_)
        ));
    }
}
