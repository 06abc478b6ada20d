//! Delimited text reader with encoding and delimiter detection
//!
//! Files come from spreadsheet exports of unknown origin, so neither the
//! encoding nor the delimiter is known up front. Candidate encodings are
//! tried in order (detected, UTF-8, Latin-1, Windows-1252) and, for each
//! encoding that decodes the bytes, every candidate delimiter is tried.
//! The first parse yielding more than one column wins.

use crate::error::TableError;
use crate::reader::cell_value;
use crate::table::Table;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

/// Prefix fed to the encoding detector
pub const DETECTION_PREFIX_BYTES: usize = 300 * 1024;

/// Candidate delimiters, in trial order
pub const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A text encoding to try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1: every byte maps to the code point of the same value
    Latin1,
    Whatwg(&'static Encoding),
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Latin1 => "ISO-8859-1",
            TextEncoding::Whatwg(encoding) => encoding.name(),
        }
    }

    /// Strict decode; `None` when the bytes are not valid in this encoding.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Latin1 => Some(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
            TextEncoding::Whatwg(encoding) => {
                let bytes = if *encoding == UTF_8 {
                    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
                } else {
                    bytes
                };
                encoding.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

/// Guess the encoding from a bounded prefix of the bytes
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let prefix_len = bytes.len().min(DETECTION_PREFIX_BYTES);
    let mut detector = EncodingDetector::new();
    detector.feed(&bytes[..prefix_len], prefix_len == bytes.len());
    detector.guess(None, true)
}

/// Encodings in trial order, without duplicates
pub fn candidate_encodings(bytes: &[u8]) -> Vec<TextEncoding> {
    let detected = if bytes.starts_with(UTF8_BOM) {
        UTF_8
    } else {
        detect_encoding(bytes)
    };

    let mut candidates = Vec::with_capacity(4);
    for candidate in [
        TextEncoding::Whatwg(detected),
        TextEncoding::Whatwg(UTF_8),
        TextEncoding::Latin1,
        TextEncoding::Whatwg(WINDOWS_1252),
    ] {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Read delimited text into an untyped table.
///
/// The first record is the header. Rows shorter than the header are padded
/// with missing values; a row longer than the header rejects the
/// delimiter. When no combination yields more than one column the widest
/// successful parse is returned, and when nothing parses at all the input
/// is reported as undetectable.
pub fn read_csv(bytes: &[u8]) -> Result<Table, TableError> {
    let mut best: Option<Table> = None;

    for encoding in candidate_encodings(bytes) {
        let Some(text) = encoding.decode(bytes) else {
            tracing::debug!(encoding = encoding.name(), "Encoding rejected by decoder");
            continue;
        };
        let text = text.strip_prefix('\u{feff}').unwrap_or(text.as_ref());

        for delimiter in DELIMITERS {
            match parse_delimited(text, delimiter) {
                Ok(table) if table.num_columns() > 1 => {
                    tracing::debug!(
                        encoding = encoding.name(),
                        delimiter = %(delimiter as char).escape_default(),
                        columns = table.num_columns(),
                        rows = table.num_rows(),
                        "Delimited text parsed"
                    );
                    return Ok(table);
                }
                Ok(table) => {
                    let wider = best
                        .as_ref()
                        .map_or(true, |b| table.num_columns() > b.num_columns());
                    if wider {
                        best = Some(table);
                    }
                }
                Err(reason) => {
                    tracing::trace!(
                        encoding = encoding.name(),
                        delimiter = %(delimiter as char).escape_default(),
                        reason = %reason,
                        "Delimiter rejected"
                    );
                }
            }
        }
    }

    best.ok_or_else(|| TableError::Parse("undetectable format".to_string()))
}

fn parse_delimited(text: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header: Vec<String> = match records.next() {
        Some(record) => record
            .map_err(|e| e.to_string())?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Err("no header row".to_string()),
    };

    let width = header.len();
    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.len() > width {
            return Err(format!(
                "row {} has {} fields, header has {}",
                index + 2,
                record.len(),
                width
            ));
        }
        rows.push(record.iter().map(cell_value).collect());
    }

    Ok(Table::from_text_rows(header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 3] = ["Name", "Stadt", "Betrag"];
    const ROWS: [[&str; 3]; 4] = [
        ["Müller", "Zürich", "12.5"],
        ["Schäfer", "Köln", "7"],
        ["Bäcker", "Lübeck", "3.25"],
        ["Jäger", "Düsseldorf", "100"],
    ];

    fn render(delimiter: char) -> String {
        let mut text = HEADER.join(&delimiter.to_string());
        for row in ROWS {
            text.push('\n');
            text.push_str(&row.join(&delimiter.to_string()));
        }
        text.push('\n');
        text
    }

    fn encode(text: &str, encoding: TextEncoding) -> Vec<u8> {
        match encoding {
            TextEncoding::Latin1 => text.chars().map(|c| c as u32 as u8).collect(),
            TextEncoding::Whatwg(encoding) => encoding.encode(text).0.into_owned(),
        }
    }

    fn assert_grid(table: &Table) {
        assert_eq!(table.column_names(), HEADER);
        for (col, name) in HEADER.iter().enumerate() {
            let expected: Vec<Option<&str>> = ROWS.iter().map(|r| Some(r[col])).collect();
            assert_eq!(table.text_values(name).unwrap(), expected);
        }
    }

    #[test]
    fn test_recovers_grid_for_every_encoding_and_delimiter() {
        for encoding in [
            TextEncoding::Whatwg(UTF_8),
            TextEncoding::Latin1,
            TextEncoding::Whatwg(WINDOWS_1252),
        ] {
            for delimiter in [',', ';', '\t', '|'] {
                let bytes = encode(&render(delimiter), encoding);
                let table = read_csv(&bytes).unwrap_or_else(|e| {
                    panic!("{} / {:?}: {}", encoding.name(), delimiter, e)
                });
                assert_grid(&table);
            }
        }
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(render(';').as_bytes());

        let table = read_csv(&bytes).unwrap();
        assert_eq!(table.column_names()[0], "Name");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = read_csv(b"a;b;c\n1;2\n3;4;5\n").unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.text_values("c").unwrap(), vec![None, Some("5")]);
    }

    #[test]
    fn test_na_tokens_become_missing() {
        let table = read_csv(b"a,b\nNULL,1\n,n/a\n").unwrap();

        assert_eq!(table.text_values("a").unwrap(), vec![None, None]);
        assert_eq!(table.text_values("b").unwrap(), vec![Some("1"), None]);
    }

    #[test]
    fn test_single_column_input_returns_widest_parse() {
        let table = read_csv(b"value\n1\n2\n").unwrap();

        assert_eq!(table.column_names(), vec!["value"]);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_empty_input_is_undetectable() {
        assert!(matches!(read_csv(b""), Err(TableError::Parse(_))));
    }

    #[test]
    fn test_duplicate_headers_are_kept_raw() {
        let table = read_csv(b"Age,Age,\n1,2,3\n").unwrap();
        assert_eq!(table.column_names(), vec!["Age", "Age", ""]);
    }
}
