use crate::error::TableError;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;

/// Media type of an Arrow IPC stream
pub const ARROW_STREAM_CONTENT_TYPE: &str = "application/vnd.apache.arrow.stream";

/// Serialize a batch as an Arrow IPC stream (schema message, one batch,
/// end-of-stream marker).
pub fn encode_ipc_stream(batch: &RecordBatch) -> Result<Vec<u8>, TableError> {
    let mut buffer = Vec::new();
    {
        let schema = batch.schema();
        let mut writer = StreamWriter::try_new(&mut buffer, &schema)?;
        writer.write(batch)?;
        writer.finish()?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::ipc::reader::StreamReader;
    use std::io::Cursor;
    use std::sync::Arc;

    #[test]
    fn test_stream_decodes_back() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();

        let bytes = encode_ipc_stream(&batch).unwrap();
        let reader = StreamReader::try_new(Cursor::new(bytes), None).unwrap();
        let batches: Vec<RecordBatch> = reader.collect::<Result<_, _>>().unwrap();

        assert_eq!(batches, vec![batch]);
    }
}
