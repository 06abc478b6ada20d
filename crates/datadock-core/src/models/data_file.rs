use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;
use uuid::Uuid;

/// Tabular formats understood by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Csv,
    /// `.xlsx`, `.xls` and `.xlsm` workbooks
    Excel,
    /// Python pickle (trusted sources only)
    Pickle,
    Parquet,
}

impl FileKind {
    /// Classify a file extension; a leading dot and letter case are ignored.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Some(FileKind::Csv),
            "xlsx" | "xls" | "xlsm" => Some(FileKind::Excel),
            "pkl" => Some(FileKind::Pickle),
            "parquet" => Some(FileKind::Parquet),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Whether the format holds several sheets
    pub fn is_workbook(self) -> bool {
        matches!(self, FileKind::Excel)
    }

    /// Whether the format is already columnar and typed
    pub fn is_columnar(self) -> bool {
        matches!(self, FileKind::Parquet)
    }
}

/// Stored File Record: one uploaded tabular file.
///
/// Records are immutable once created; deletion cascades to the stored bytes
/// and the cache directory of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DataFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Display title; ingestion uses the filename without extension.
    pub title: String,
    /// Storage key of the original bytes (`user_{owner}/{filename}`).
    pub file_path: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DataFile {
    /// Final path component of the storage key
    pub fn filename(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(self.file_path.as_str())
    }

    /// Lower-cased extension including the dot, or an empty string.
    pub fn extension(&self) -> String {
        Path::new(self.filename())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default()
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_extension(&self.extension())
    }

    pub fn is_analyzable(&self) -> bool {
        self.kind().is_some()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Fields required to create a [`DataFile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDataFile {
    pub owner_id: Uuid,
    pub title: String,
    pub file_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> DataFile {
        DataFile {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: "report".to_string(),
            file_path: path.to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_extension_is_lowercased_with_dot() {
        let file = record("user_1/Report.XLSX");
        assert_eq!(file.filename(), "Report.XLSX");
        assert_eq!(file.extension(), ".xlsx");
        assert_eq!(file.kind(), Some(FileKind::Excel));
    }

    #[test]
    fn test_analyzable_formats() {
        for path in ["a.csv", "a.xlsx", "a.xls", "a.xlsm", "a.pkl", "a.parquet"] {
            assert!(record(path).is_analyzable(), "{} should be analyzable", path);
        }
        assert!(!record("a.txt").is_analyzable());
        assert!(!record("noext").is_analyzable());
        assert_eq!(record("noext").extension(), "");
    }

    #[test]
    fn test_file_kind_flags() {
        assert!(FileKind::Excel.is_workbook());
        assert!(!FileKind::Csv.is_workbook());
        assert!(FileKind::Parquet.is_columnar());
        assert_eq!(
            FileKind::from_path(Path::new("inbox/bob_q3.PKL")),
            Some(FileKind::Pickle)
        );
    }
}
