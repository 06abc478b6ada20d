use crate::error::TableError;
use crate::table::{ColumnData, Table};
use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMillisecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use std::sync::Arc;

/// Convert a normalized table into a record batch.
///
/// Consistency rules of the columnar form:
/// * float columns carry no nulls; missing values are NaN
/// * integer columns with missing values become float columns
/// * missing text, and the literal `"None"`, is null
/// * timestamps are millisecond precision, UTC
pub fn to_record_batch(table: &Table) -> Result<RecordBatch, TableError> {
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.num_columns());

    for column in table.columns() {
        let (data_type, array): (DataType, ArrayRef) = match &column.data {
            ColumnData::Text(values) => (
                DataType::Utf8,
                Arc::new(StringArray::from(
                    values
                        .iter()
                        .map(|v| v.as_deref().filter(|s| *s != "None"))
                        .collect::<Vec<_>>(),
                )),
            ),
            ColumnData::Int(values) if values.iter().all(Option::is_some) => (
                DataType::Int64,
                Arc::new(Int64Array::from(values.clone())),
            ),
            ColumnData::Int(values) => (
                DataType::Float64,
                Arc::new(Float64Array::from(
                    values
                        .iter()
                        .map(|v| v.map_or(f64::NAN, |i| i as f64))
                        .collect::<Vec<_>>(),
                )),
            ),
            ColumnData::Float(values) => (
                DataType::Float64,
                Arc::new(Float64Array::from(
                    values
                        .iter()
                        .map(|v| v.unwrap_or(f64::NAN))
                        .collect::<Vec<_>>(),
                )),
            ),
            ColumnData::Bool(values) => (
                DataType::Boolean,
                Arc::new(BooleanArray::from(values.clone())),
            ),
            ColumnData::Timestamp(values) => (
                DataType::Timestamp(TimeUnit::Millisecond, None),
                Arc::new(TimestampMillisecondArray::from(values.clone())),
            ),
        };

        fields.push(Field::new(&column.name, data_type, true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &options,
    )?)
}
