//! Arrow IPC encoding for the child exchange and the wire protocol.
//!
//! Every feather message is a complete, self-describing IPC stream: schema,
//! record batches, end marker. Chunks exchanged with a child carry exactly
//! one batch per message; wire responses may carry several.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::BinaryArray;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;

use super::settings::{OutputType, StreamSettings};
use crate::common::error::StreamError;

/// Encode batches as one IPC stream.
pub fn encode_ipc(batches: &[RecordBatch]) -> Result<Vec<u8>, StreamError> {
    if batches.is_empty() {
        return Err(StreamError::Protocol("cannot encode empty batch list"));
    }
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &batches[0].schema())?;
        for b in batches {
            writer.write(b)?;
        }
        writer.finish()?;
    }
    Ok(buf)
}

/// Decode one IPC stream into its batches.
pub fn decode_ipc(bytes: &[u8]) -> Result<Vec<RecordBatch>, StreamError> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let mut batches = Vec::new();
    for b in reader {
        batches.push(b?);
    }
    Ok(batches)
}

/// Wrap opaque payload bytes as a one-row batch with a single binary column.
///
/// Uploaded payloads are stored and broadcast in this shape so that every
/// stored array is IPC-codable.
pub fn wrap_payload(data: &[u8]) -> Result<RecordBatch, StreamError> {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "payload",
        DataType::Binary,
        false,
    )]));
    let col = BinaryArray::from_vec(vec![data]);
    Ok(RecordBatch::try_new(schema, vec![Arc::new(col)])?)
}

/// Extract payload bytes out of a batch produced by [`wrap_payload`].
pub fn unwrap_payload(batch: &RecordBatch) -> Result<Vec<u8>, StreamError> {
    if batch.num_columns() != 1 || batch.num_rows() != 1 {
        return Err(StreamError::Protocol("payload batch must be 1x1"));
    }
    let col = batch
        .column(0)
        .as_any()
        .downcast_ref::<BinaryArray>()
        .ok_or(StreamError::Protocol("payload column must be binary"))?;
    Ok(col.value(0).to_vec())
}

/// Check a child response batch against the declared output schema.
pub fn check_response_schema(
    batch: &RecordBatch,
    settings: &StreamSettings,
) -> Result<(), StreamError> {
    if settings.types.is_empty() {
        return Ok(());
    }
    if batch.num_columns() != settings.types.len() {
        return Err(StreamError::Protocol(
            "child response column count differs from types=",
        ));
    }
    for (field, want) in batch.schema().fields().iter().zip(&settings.types) {
        let ok = matches!(
            (field.data_type(), want),
            (DataType::Float64, OutputType::Double)
                | (DataType::Int64, OutputType::Int64)
                | (DataType::Utf8, OutputType::String)
        );
        if !ok {
            return Err(StreamError::Protocol(
                "child response column type differs from types=",
            ));
        }
    }
    Ok(())
}

/// Rename response columns to the declared output names.
pub fn apply_names(
    batch: &RecordBatch,
    settings: &StreamSettings,
) -> Result<RecordBatch, StreamError> {
    if settings.names.is_empty() || settings.names.len() != batch.num_columns() {
        return Ok(batch.clone());
    }
    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .zip(&settings.names)
        .map(|(f, name)| Field::new(name, f.data_type().clone(), f.is_nullable()))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, batch.columns().to_vec())?)
}
