//! In-memory table model shared by the readers and the normalizer

use crate::error::TableError;

/// Values of one column. `None` is a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    /// Milliseconds since the Unix epoch, UTC
    Timestamp(Vec<Option<i64>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the value at `row` is missing. NaN floats count as missing.
    pub fn is_missing(&self, row: usize) -> bool {
        match self {
            ColumnData::Text(v) => matches!(v.get(row), Some(None) | None),
            ColumnData::Int(v) => matches!(v.get(row), Some(None) | None),
            ColumnData::Float(v) => match v.get(row) {
                Some(Some(f)) => f.is_nan(),
                _ => true,
            },
            ColumnData::Bool(v) => matches!(v.get(row), Some(None) | None),
            ColumnData::Timestamp(v) => matches!(v.get(row), Some(None) | None),
        }
    }

    pub fn is_all_missing(&self) -> bool {
        (0..self.len()).all(|row| self.is_missing(row))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Text(_) => "text",
            ColumnData::Int(_) => "int",
            ColumnData::Float(_) => "float",
            ColumnData::Bool(_) => "bool",
            ColumnData::Timestamp(_) => "timestamp",
        }
    }

    /// Keep only the rows whose flag in `keep` is set
    pub(crate) fn retain_rows(self, keep: &[bool]) -> Self {
        fn filter<T>(values: Vec<T>, keep: &[bool]) -> Vec<T> {
            values
                .into_iter()
                .zip(keep)
                .filter_map(|(v, k)| k.then_some(v))
                .collect()
        }

        match self {
            ColumnData::Text(v) => ColumnData::Text(filter(v, keep)),
            ColumnData::Int(v) => ColumnData::Int(filter(v, keep)),
            ColumnData::Float(v) => ColumnData::Float(filter(v, keep)),
            ColumnData::Bool(v) => ColumnData::Bool(filter(v, keep)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(filter(v, keep)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn text<S: Into<String>>(name: &str, values: impl IntoIterator<Item = Option<S>>) -> Self {
        Self::new(
            name,
            ColumnData::Text(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }
}

/// A rectangular table: every column holds the same number of rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let num_rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.data.len() != num_rows) {
            return Err(TableError::Parse(format!(
                "column '{}' has {} rows, expected {}",
                bad.name,
                bad.data.len(),
                num_rows
            )));
        }
        Ok(Self { columns, num_rows })
    }

    /// Build a text table from a header and rows no wider than the header.
    /// Short rows are padded with missing values.
    pub fn from_text_rows(header: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = header.len();
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); width];
        let num_rows = rows.len();

        for row in rows {
            let mut cells = row.into_iter();
            for column in values.iter_mut() {
                column.push(cells.next().flatten());
            }
        }

        let columns = header
            .into_iter()
            .zip(values)
            .map(|(name, v)| Column::new(name, ColumnData::Text(v)))
            .collect();

        Self {
            columns,
            num_rows: if width == 0 { 0 } else { num_rows },
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// No rows or no columns
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Row-wise view of a text column, for assertions and debugging
    pub fn text_values(&self, name: &str) -> Option<Vec<Option<&str>>> {
        match &self.column(name)?.data {
            ColumnData::Text(v) => Some(v.iter().map(|c| c.as_deref()).collect()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_rows_pads_short_rows() {
        let table = Table::from_text_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![
                vec![Some("1".to_string()), Some("2".to_string())],
                vec![Some("3".to_string())],
            ],
        );

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.text_values("b").unwrap(), vec![Some("2"), None]);
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = Table::new(vec![
            Column::new("a", ColumnData::Int(vec![Some(1), Some(2)])),
            Column::new("b", ColumnData::Int(vec![Some(1)])),
        ]);
        assert!(matches!(result, Err(TableError::Parse(_))));
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let data = ColumnData::Float(vec![Some(f64::NAN), None]);
        assert!(data.is_all_missing());
    }
}
