//! Runner function registry.
//!
//! A packed function names an entry here. Registered functions transform the
//! chunk stream on the child side; the same registry drives both the feather
//! path (record batches) and the TSV path (text lines).

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

use crate::common::error::StreamError;
use crate::protocol::FunctionSpec;

fn parse_arg<T: std::str::FromStr>(spec: &FunctionSpec, idx: usize) -> Result<T, StreamError> {
    spec.args
        .get(idx)
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| StreamError::BadArgs(format!("{}: bad argument {idx}", spec.name)))
}

/// Keep only the first `n` rows across all chunks.
fn head(spec: &FunctionSpec, input: Vec<RecordBatch>) -> Result<Vec<RecordBatch>, StreamError> {
    let mut remaining: usize = parse_arg(spec, 0)?;
    let mut out = Vec::new();
    for batch in &input {
        if remaining == 0 {
            break;
        }
        let take = batch.num_rows().min(remaining);
        remaining -= take;
        out.push(batch.slice(0, take));
    }
    if out.is_empty() {
        if let Some(first) = input.first() {
            // keep the schema visible even when nothing survives
            out.push(first.slice(0, 0));
        }
    }
    Ok(out)
}

fn identity(_spec: &FunctionSpec, input: Vec<RecordBatch>) -> Result<Vec<RecordBatch>, StreamError> {
    Ok(input)
}

/// Multiply every numeric column by a factor.
fn scale(spec: &FunctionSpec, input: Vec<RecordBatch>) -> Result<Vec<RecordBatch>, StreamError> {
    let factor: f64 = parse_arg(spec, 0)?;
    let mut out = Vec::with_capacity(input.len());
    for batch in input {
        let cols: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .map(|col| match col.data_type() {
                DataType::Float64 => {
                    let a = col.as_any().downcast_ref::<Float64Array>().unwrap();
                    let scaled: Float64Array = a.iter().map(|v| v.map(|x| x * factor)).collect();
                    Arc::new(scaled) as ArrayRef
                }
                DataType::Int64 => {
                    let a = col.as_any().downcast_ref::<Int64Array>().unwrap();
                    let scaled: Int64Array =
                        a.iter().map(|v| v.map(|x| (x as f64 * factor) as i64)).collect();
                    Arc::new(scaled) as ArrayRef
                }
                _ => col.clone(),
            })
            .collect();
        out.push(RecordBatch::try_new(batch.schema(), cols)?);
    }
    Ok(out)
}

type MapFn = fn(&FunctionSpec, Vec<RecordBatch>) -> Result<Vec<RecordBatch>, StreamError>;

fn lookup(name: &str) -> Option<MapFn> {
    match name {
        "head" => Some(head),
        "identity" => Some(identity),
        "scale" => Some(scale),
        _ => None,
    }
}

/// Apply a packed function to a chunk list.
pub fn apply(spec: &FunctionSpec, input: Vec<RecordBatch>) -> Result<Vec<RecordBatch>, StreamError> {
    let f = lookup(&spec.name)
        .ok_or_else(|| StreamError::BadArgs(format!("unknown function {}", spec.name)))?;
    f(spec, input)
}

/// Apply a packed function to a TSV line block. Only row-oriented functions
/// make sense here.
pub fn apply_lines(spec: &FunctionSpec, lines: Vec<String>) -> Result<Vec<String>, StreamError> {
    match spec.name.as_str() {
        "identity" => Ok(lines),
        "head" => {
            let n: usize = parse_arg(spec, 0)?;
            let mut lines = lines;
            lines.truncate(n);
            Ok(lines)
        }
        other => Err(StreamError::BadArgs(format!(
            "function {other} not usable in tsv mode"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};

    fn chunk(values: &[f64]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)]));
        RecordBatch::try_new(
            schema,
            vec![Arc::new(Float64Array::from(values.to_vec()))],
        )
        .unwrap()
    }

    fn values(batch: &RecordBatch) -> Vec<f64> {
        batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap()
            .values()
            .to_vec()
    }

    #[test]
    fn head_takes_first_rows() {
        let spec = FunctionSpec::new("head", &["1"]);
        let out = apply(&spec, vec![chunk(&[1.0, 2.0, 3.0])]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(values(&out[0]), vec![1.0]);
    }

    #[test]
    fn head_spans_chunks() {
        let spec = FunctionSpec::new("head", &["3"]);
        let out = apply(&spec, vec![chunk(&[1.0, 2.0]), chunk(&[3.0, 4.0])]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(values(&out[1]), vec![3.0]);
    }

    #[test]
    fn scale_multiplies() {
        let spec = FunctionSpec::new("scale", &["2.5"]);
        let out = apply(&spec, vec![chunk(&[2.0, 4.0])]).unwrap();
        assert_eq!(values(&out[0]), vec![5.0, 10.0]);
    }

    #[test]
    fn unknown_function_rejected() {
        let spec = FunctionSpec::new("no_such", &[]);
        assert!(apply(&spec, vec![chunk(&[1.0])]).is_err());
    }

    #[test]
    fn head_on_lines() {
        let spec = FunctionSpec::new("head", &["2"]);
        let out = apply_lines(&spec, vec!["a".into(), "b".into(), "c".into()]).unwrap();
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn scale_rejected_on_lines() {
        let spec = FunctionSpec::new("scale", &["2"]);
        assert!(apply_lines(&spec, vec!["a".into()]).is_err());
    }
}
