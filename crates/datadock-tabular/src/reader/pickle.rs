//! Pickle reader
//!
//! Pickles are only read from trusted sources (the user's own inbox or
//! uploads). Two layouts are understood:
//!
//! * a dict mapping column name to a list (or tuple) of values
//! * a list of dicts, one per record
//!
//! Columns keep the order in which the keys were pickled. Decoding never
//! runs code: references to Python globals decode as `None`, so pickled
//! pandas frames and other objects are rejected as unsupported. The format
//! can still describe arbitrary object graphs, so callers must keep pickles
//! on the trusted side of the ingestion boundary.

use crate::error::TableError;
use crate::table::{Column, ColumnData, Table};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_pickle::DeOptions;
use std::fmt;

/// A decoded pickle value. Dicts are kept as key/value pairs in stream order.
#[derive(Debug, Clone, PartialEq)]
enum PickleValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<PickleValue>),
    Dict(Vec<(PickleValue, PickleValue)>),
}

struct PickleValueVisitor;

impl<'de> Visitor<'de> for PickleValueVisitor {
    type Value = PickleValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a pickled value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<PickleValue, E> {
        Ok(PickleValue::None)
    }

    fn visit_none<E: de::Error>(self) -> Result<PickleValue, E> {
        Ok(PickleValue::None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<PickleValue, D::Error> {
        PickleValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<PickleValue, E> {
        Ok(PickleValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PickleValue, E> {
        Ok(PickleValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PickleValue, E> {
        Ok(i64::try_from(v).map_or(PickleValue::Float(v as f64), PickleValue::Int))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<PickleValue, E> {
        Ok(PickleValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PickleValue, E> {
        Ok(PickleValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<PickleValue, E> {
        Ok(PickleValue::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<PickleValue, E> {
        Ok(PickleValue::Text(String::from_utf8_lossy(v).into_owned()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<PickleValue, E> {
        Ok(PickleValue::Text(String::from_utf8_lossy(&v).into_owned()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PickleValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(PickleValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<PickleValue, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }
        Ok(PickleValue::Dict(entries))
    }
}

impl<'de> Deserialize<'de> for PickleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PickleValueVisitor)
    }
}

pub fn read_pickle(bytes: &[u8]) -> Result<Table, TableError> {
    let value: PickleValue =
        serde_pickle::from_slice(bytes, DeOptions::new().replace_unresolved_globals())
            .map_err(|e| TableError::UnsupportedFormat(format!("unreadable pickle: {}", e)))?;

    match value {
        PickleValue::Dict(entries) => from_column_dict(entries),
        PickleValue::List(items) => from_records(items),
        other => Err(TableError::UnsupportedFormat(format!(
            "pickle holds a {}, expected a dict of columns or a list of records",
            kind_name(&other)
        ))),
    }
}

fn from_column_dict(entries: Vec<(PickleValue, PickleValue)>) -> Result<Table, TableError> {
    let mut columns = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let name = key_name(key);
        let values = match value {
            PickleValue::List(values) => values,
            other => {
                return Err(TableError::UnsupportedFormat(format!(
                    "column '{}' holds a {}, expected a list",
                    name,
                    kind_name(&other)
                )))
            }
        };
        columns.push(Column::new(name, typed_column(values)));
    }
    Table::new(columns)
}

fn from_records(items: Vec<PickleValue>) -> Result<Table, TableError> {
    let mut names: Vec<String> = Vec::new();
    let mut records: Vec<Vec<(String, PickleValue)>> = Vec::with_capacity(items.len());

    for item in items {
        let entries = match item {
            PickleValue::Dict(entries) => entries,
            other => {
                return Err(TableError::UnsupportedFormat(format!(
                    "record is a {}, expected a dict",
                    kind_name(&other)
                )))
            }
        };
        let record: Vec<(String, PickleValue)> =
            entries.into_iter().map(|(k, v)| (key_name(k), v)).collect();
        for (name, _) in &record {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        records.push(record);
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter_mut()
                .map(|record| {
                    record
                        .iter()
                        .position(|(key, _)| *key == name)
                        .map_or(PickleValue::None, |i| record.swap_remove(i).1)
                })
                .collect();
            Column::new(name, typed_column(values))
        })
        .collect();
    Table::new(columns)
}

/// Pick the narrowest column type that holds every value
fn typed_column(values: Vec<PickleValue>) -> ColumnData {
    let present = || values.iter().filter(|v| !matches!(v, PickleValue::None));

    if present().next().is_none() {
        return ColumnData::Text(vec![None; values.len()]);
    }
    if present().all(|v| matches!(v, PickleValue::Bool(_))) {
        return ColumnData::Bool(
            values
                .iter()
                .map(|v| match v {
                    PickleValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        );
    }
    if present().all(|v| matches!(v, PickleValue::Int(_))) {
        return ColumnData::Int(
            values
                .iter()
                .map(|v| match v {
                    PickleValue::Int(i) => Some(*i),
                    _ => None,
                })
                .collect(),
        );
    }
    if present().all(|v| matches!(v, PickleValue::Int(_) | PickleValue::Float(_))) {
        return ColumnData::Float(
            values
                .iter()
                .map(|v| match v {
                    PickleValue::Int(i) => Some(*i as f64),
                    PickleValue::Float(f) if !f.is_nan() => Some(*f),
                    _ => None,
                })
                .collect(),
        );
    }

    ColumnData::Text(values.into_iter().map(value_text).collect())
}

fn value_text(value: PickleValue) -> Option<String> {
    match value {
        PickleValue::None => None,
        PickleValue::Text(s) => Some(s),
        PickleValue::Bool(b) => Some(if b { "True" } else { "False" }.to_string()),
        PickleValue::Int(i) => Some(i.to_string()),
        PickleValue::Float(f) if f.is_nan() => None,
        PickleValue::Float(f) => Some(f.to_string()),
        other => Some(format!("{:?}", other)),
    }
}

fn key_name(key: PickleValue) -> String {
    match key {
        PickleValue::None => "None".to_string(),
        PickleValue::Bool(b) => b.to_string(),
        PickleValue::Int(i) => i.to_string(),
        PickleValue::Float(f) => f.to_string(),
        PickleValue::Text(s) => s,
        other => format!("{:?}", other),
    }
}

fn kind_name(value: &PickleValue) -> &'static str {
    match value {
        PickleValue::None => "None",
        PickleValue::Bool(_) => "bool",
        PickleValue::Int(_) => "int",
        PickleValue::Float(_) => "float",
        PickleValue::Text(_) => "str",
        PickleValue::List(_) => "list",
        PickleValue::Dict(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_pickle::{HashableValue, SerOptions, Value};
    use std::collections::BTreeMap;

    fn pickle(value: &Value) -> Vec<u8> {
        serde_pickle::value_to_vec(value, SerOptions::new()).unwrap()
    }

    fn key(name: &str) -> HashableValue {
        HashableValue::String(name.to_string())
    }

    #[test]
    fn test_column_dict() {
        let mut map = BTreeMap::new();
        map.insert(key("age"), Value::List(vec![Value::I64(30), Value::None]));
        map.insert(
            key("name"),
            Value::List(vec![
                Value::String("Ada".to_string()),
                Value::String("Linus".to_string()),
            ]),
        );
        map.insert(key("score"), Value::List(vec![Value::F64(1.5), Value::I64(2)]));

        let table = read_pickle(&pickle(&Value::Dict(map))).unwrap();

        assert_eq!(table.column_names(), vec!["age", "name", "score"]);
        assert_eq!(
            table.column("age").unwrap().data,
            ColumnData::Int(vec![Some(30), None])
        );
        assert_eq!(
            table.column("score").unwrap().data,
            ColumnData::Float(vec![Some(1.5), Some(2.0)])
        );
        assert_eq!(table.text_values("name").unwrap(), vec![Some("Ada"), Some("Linus")]);
    }

    #[derive(Serialize)]
    struct Frame {
        name: Vec<&'static str>,
        age: Vec<Option<i64>>,
        city: Vec<&'static str>,
    }

    #[test]
    fn test_column_dict_keeps_pickled_key_order() {
        let frame = Frame {
            name: vec!["Ada", "Linus"],
            age: vec![Some(36), None],
            city: vec!["London", "Helsinki"],
        };
        let bytes = serde_pickle::to_vec(&frame, SerOptions::new()).unwrap();

        let table = read_pickle(&bytes).unwrap();

        assert_eq!(table.column_names(), vec!["name", "age", "city"]);
        assert_eq!(
            table.column("age").unwrap().data,
            ColumnData::Int(vec![Some(36), None])
        );
    }

    #[derive(Serialize)]
    struct Row {
        zone: &'static str,
        amount: f64,
    }

    #[test]
    fn test_records_keep_pickled_key_order() {
        let rows = vec![
            Row { zone: "Nord", amount: 1.5 },
            Row { zone: "Süd", amount: 2.0 },
        ];
        let bytes = serde_pickle::to_vec(&rows, SerOptions::new()).unwrap();

        let table = read_pickle(&bytes).unwrap();

        assert_eq!(table.column_names(), vec!["zone", "amount"]);
        assert_eq!(
            table.column("amount").unwrap().data,
            ColumnData::Float(vec![Some(1.5), Some(2.0)])
        );
    }

    #[test]
    fn test_records_with_missing_keys() {
        let mut first = BTreeMap::new();
        first.insert(key("a"), Value::I64(1));
        let mut second = BTreeMap::new();
        second.insert(key("a"), Value::I64(2));
        second.insert(key("b"), Value::Bool(true));

        let table = read_pickle(&pickle(&Value::List(vec![
            Value::Dict(first),
            Value::Dict(second),
        ])))
        .unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column("b").unwrap().data,
            ColumnData::Bool(vec![None, Some(true)])
        );
    }

    #[test]
    fn test_ragged_columns_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert(key("a"), Value::List(vec![Value::I64(1)]));
        map.insert(key("b"), Value::List(vec![]));

        assert!(read_pickle(&pickle(&Value::Dict(map))).is_err());
    }

    #[test]
    fn test_scalar_is_unsupported() {
        let result = read_pickle(&pickle(&Value::I64(7)));
        assert!(matches!(result, Err(TableError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let result = read_pickle(b"not a pickle");
        assert!(matches!(result, Err(TableError::UnsupportedFormat(_))));
    }
}
