//! Tab-separated child exchange encoding.
//!
//! TSV mode ships each chunk as a line count followed by that many lines,
//! tab-separated cells per row. The child answers in the same shape, and
//! each response block becomes one chunk with a single string attribute.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::common::error::StreamError;

/// Render a batch as TSV lines, one per row.
pub fn batch_to_lines(batch: &RecordBatch) -> Result<Vec<String>, StreamError> {
    let mut lines = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut cells = Vec::with_capacity(batch.num_columns());
        for col in batch.columns() {
            let cell = match col.data_type() {
                DataType::Float64 => {
                    let a = col.as_any().downcast_ref::<Float64Array>().unwrap();
                    a.value(row).to_string()
                }
                DataType::Int64 => {
                    let a = col.as_any().downcast_ref::<Int64Array>().unwrap();
                    a.value(row).to_string()
                }
                DataType::Utf8 => {
                    let a = col.as_any().downcast_ref::<StringArray>().unwrap();
                    a.value(row).to_string()
                }
                other => {
                    return Err(StreamError::BadArgs(format!(
                        "type {other} not representable as tsv"
                    )))
                }
            };
            cells.push(cell);
        }
        lines.push(cells.join("\t"));
    }
    Ok(lines)
}

/// Build a single-attribute chunk out of one child response block.
pub fn lines_to_batch(lines: &[String]) -> Result<RecordBatch, StreamError> {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "response",
        DataType::Utf8,
        false,
    )]));
    let col = StringArray::from(lines.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    Ok(RecordBatch::try_new(schema, vec![Arc::new(col)])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_mixed_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("n", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![1.5, 2.0])),
                Arc::new(Int64Array::from(vec![10, 20])),
            ],
        )
        .unwrap();

        let lines = batch_to_lines(&batch).unwrap();
        assert_eq!(lines, vec!["1.5\t10", "2\t20"]);
    }

    #[test]
    fn response_block_becomes_string_chunk() {
        let lines = vec!["a\tb".to_string(), "c".to_string()];
        let batch = lines_to_batch(&lines).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), "response");
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(col.value(0), "a\tb");
    }

    #[test]
    fn rejects_unsupported_types() {
        let schema = Arc::new(Schema::new(vec![Field::new("b", DataType::Binary, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(arrow::array::BinaryArray::from_vec(vec![b"x"]))],
        )
        .unwrap();
        assert!(batch_to_lines(&batch).is_err());
    }
}
