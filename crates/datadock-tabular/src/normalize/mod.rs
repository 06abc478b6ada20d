//! Type normalizer
//!
//! Turns a freshly read table into a clean, typed one in three steps:
//!
//! 1. blank elision: `""` and `" "` become missing, then rows and columns
//!    that are entirely missing are dropped
//! 2. column names are sanitized and made unique
//! 3. text columns are converted to numbers or timestamps when a
//!    [`ConversionStrategy`] accepts them
//!
//! [`to_record_batch`] then applies the consistency rules of the columnar
//! representation.

mod columnar;
pub mod infer;

pub use columnar::to_record_batch;
pub use infer::{infer_column_type, Conversion, ConversionStrategy};

use crate::table::{Column, ColumnData, Table};
use std::collections::HashSet;

/// Normalize a table read by one of the readers
pub fn normalize(table: Table) -> Table {
    let table = elide_blanks(table);
    let names = sanitize_column_names(&table.column_names());

    let columns: Vec<Column> = table
        .into_columns()
        .into_iter()
        .zip(names)
        .map(|(column, name)| Column::new(name, infer_column_type(column.data)))
        .collect();

    Table::new(columns).unwrap_or_default()
}

/// Blank cells become missing; fully missing rows, then columns, are dropped.
pub fn elide_blanks(table: Table) -> Table {
    let num_rows = table.num_rows();
    let columns: Vec<Column> = table
        .into_columns()
        .into_iter()
        .map(|column| Column::new(column.name, blank_to_missing(column.data)))
        .collect();

    let keep_rows: Vec<bool> = (0..num_rows)
        .map(|row| columns.iter().any(|c| !c.data.is_missing(row)))
        .collect();

    let columns: Vec<Column> = columns
        .into_iter()
        .map(|c| Column::new(c.name, c.data.retain_rows(&keep_rows)))
        .filter(|c| !c.data.is_all_missing())
        .collect();

    Table::new(columns).unwrap_or_default()
}

fn blank_to_missing(data: ColumnData) -> ColumnData {
    match data {
        ColumnData::Text(values) => ColumnData::Text(
            values
                .into_iter()
                .map(|v| v.filter(|s| !s.is_empty() && s != " "))
                .collect(),
        ),
        other => other,
    }
}

/// Sanitize column names by position.
///
/// Names are trimmed; empty names, `nan`, `NaN`, `None` and pandas-style
/// `Unnamed: n` placeholders become `Column_{position}` (1-based). Repeated
/// names get `_2`, `_3`, ... suffixes.
pub fn sanitize_column_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut sanitized = Vec::with_capacity(names.len());

    for (index, raw) in names.iter().enumerate() {
        let trimmed = raw.as_ref().trim();
        let base = if trimmed.is_empty()
            || matches!(trimmed, "nan" | "NaN" | "None")
            || trimmed.starts_with("Unnamed:")
        {
            format!("Column_{}", index + 1)
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        let mut suffix = 2;
        while seen.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        sanitized.push(name);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[Option<&str>]) -> ColumnData {
        ColumnData::Text(values.iter().map(|v| v.map(str::to_string)).collect())
    }

    #[test]
    fn test_sanitize_column_names() {
        assert_eq!(
            sanitize_column_names(&["", "Unnamed: 1", "Age", "Age"]),
            vec!["Column_1", "Column_2", "Age", "Age_2"]
        );
        assert_eq!(
            sanitize_column_names(&[" Name ", "nan", "None", "Name"]),
            vec!["Name", "Column_2", "Column_3", "Name_2"]
        );
    }

    #[test]
    fn test_suffix_skips_taken_names() {
        assert_eq!(
            sanitize_column_names(&["a", "a_2", "a"]),
            vec!["a", "a_2", "a_3"]
        );
    }

    #[test]
    fn test_elide_blanks_drops_empty_rows_and_columns() {
        let table = Table::new(vec![
            Column::new("a", text(&[Some("1"), Some(" "), Some("3")])),
            Column::new("b", text(&[Some(""), None, Some(" ")])),
            Column::new("c", text(&[Some("x"), None, None])),
        ])
        .unwrap();

        let table = elide_blanks(table);

        assert_eq!(table.column_names(), vec!["a", "c"]);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.text_values("a").unwrap(), vec![Some("1"), Some("3")]);
        assert_eq!(table.text_values("c").unwrap(), vec![Some("x"), None]);
    }

    #[test]
    fn test_normalize_all_blank_table_is_empty() {
        let table = Table::new(vec![Column::new("a", text(&[Some(""), Some(" ")]))]).unwrap();
        assert!(normalize(table).is_empty());
    }

    #[test]
    fn test_normalize_names_after_elision() {
        let table = Table::new(vec![
            Column::new("gone", text(&[None, None])),
            Column::new("", text(&[Some("1"), Some("2")])),
            Column::new("Stadt", text(&[Some("Köln"), Some("Bonn")])),
        ])
        .unwrap();

        let table = normalize(table);

        assert_eq!(table.column_names(), vec!["Column_1", "Stadt"]);
        assert_eq!(
            table.column("Column_1").unwrap().data,
            ColumnData::Int(vec![Some(1), Some(2)])
        );
    }
}
