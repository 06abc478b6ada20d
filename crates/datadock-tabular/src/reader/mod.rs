//! Robust table readers
//!
//! Each reader turns the raw bytes of one file format into a [`Table`] (or,
//! for Parquet, directly into a record batch) without guessing column types;
//! typing is the normalizer's job.
//!
//! [`Table`]: crate::table::Table

pub mod csv;
pub mod excel;
pub mod parquet;
pub mod pickle;

pub use self::csv::read_csv;
pub use self::excel::Workbook;
pub use self::parquet::read_parquet;
pub use self::pickle::read_pickle;

/// Cell spellings read as missing values
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub(crate) fn is_na_token(cell: &str) -> bool {
    NA_TOKENS.contains(&cell)
}

/// Raw cell text, or `None` for a missing-value token
pub(crate) fn cell_value(cell: &str) -> Option<String> {
    if is_na_token(cell) {
        None
    } else {
        Some(cell.to_string())
    }
}
