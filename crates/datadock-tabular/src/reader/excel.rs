//! Excel workbook reader

use crate::error::TableError;
use crate::reader::cell_value;
use crate::table::Table;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader, Sheets};
use std::io::Cursor;

/// An opened workbook. Sheets are parsed on demand.
pub struct Workbook {
    sheets: Sheets<Cursor<Vec<u8>>>,
}

impl Workbook {
    pub fn open(bytes: Vec<u8>) -> Result<Self, TableError> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| TableError::Parse(format!("corrupt workbook: {}", e)))?;
        Ok(Self { sheets })
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    /// The requested sheet when it exists, otherwise the first sheet.
    /// `None` only for a workbook without sheets.
    pub fn resolve_sheet(&self, requested: Option<&str>) -> Option<String> {
        let names = self.sheet_names();
        if let Some(requested) = requested {
            if names.iter().any(|n| n == requested) {
                return Some(requested.to_string());
            }
            tracing::debug!(requested, "Sheet not found, falling back to the first sheet");
        }
        names.into_iter().next()
    }

    /// Parse one sheet: first row is the header, every cell is kept as text.
    pub fn read_sheet(&mut self, name: &str) -> Result<Table, TableError> {
        let range = self
            .sheets
            .worksheet_range(name)
            .map_err(|e| TableError::Parse(format!("sheet '{}': {}", name, e)))?;

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(Table::default());
        };

        let header: Vec<String> = header_row
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default())
            .collect();
        let width = header.len();

        let body = rows
            .map(|row| {
                row.iter()
                    .take(width)
                    .map(|cell| cell_text(cell).and_then(|text| cell_value(&text)))
                    .collect()
            })
            .collect();

        Ok(Table::from_text_rows(header, body))
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        Data::DateTime(_) => Some(
            cell.as_datetime()
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| cell.to_string()),
        ),
        Data::Error(e) => Some(e.to_string()),
    }
}

/// Minimal xlsx packages for tests
#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::write::{FileOptions, ZipWriter};

    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    fn column_letter(index: usize) -> char {
        (b'A' + index as u8) as char
    }

    fn sheet_xml(rows: &[&[&str]]) -> String {
        let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{}"><sheetData>"#, MAIN_NS);
        for (r, row) in rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let reference = format!("{}{}", column_letter(c), r + 1);
                if cell.parse::<f64>().is_ok() {
                    xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, cell));
                } else {
                    xml.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference, cell
                    ));
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }

    /// Build an xlsx workbook; numeric-looking cells are stored as numbers.
    pub(crate) fn xlsx(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = FileOptions::default();

            let mut workbook = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{}" xmlns:r="{}"><sheets>"#,
                MAIN_NS, REL_NS
            );
            let mut rels = String::from(
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            );
            for (i, (name, _)) in sheets.iter().enumerate() {
                workbook.push_str(&format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    name,
                    i + 1,
                    i + 1
                ));
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{}" Type="{}/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                    i + 1,
                    REL_NS,
                    i + 1
                ));
            }
            workbook.push_str("</sheets></workbook>");
            rels.push_str("</Relationships>");

            let content_types = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/></Types>"#;

            let mut parts = vec![
                ("[Content_Types].xml".to_string(), content_types.to_string()),
                ("xl/workbook.xml".to_string(), workbook),
                ("xl/_rels/workbook.xml.rels".to_string(), rels),
            ];
            for (i, (_, rows)) in sheets.iter().enumerate() {
                parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(rows)));
            }

            for (path, content) in parts {
                zip.start_file(path, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }
}
