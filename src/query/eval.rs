//! Build expression evaluation.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use super::parser::{AttrType, BuildExpr, Expr};
use crate::common::error::QueryError;

fn eval_expr(e: &Expr, dim: i64) -> f64 {
    match e {
        Expr::Num(v) => *v,
        Expr::Dim => dim as f64,
        Expr::Neg(x) => -eval_expr(x, dim),
        Expr::Add(a, b) => eval_expr(a, dim) + eval_expr(b, dim),
        Expr::Sub(a, b) => eval_expr(a, dim) - eval_expr(b, dim),
        Expr::Mul(a, b) => eval_expr(a, dim) * eval_expr(b, dim),
        Expr::Div(a, b) => eval_expr(a, dim) / eval_expr(b, dim),
    }
}

fn build_schema(b: &BuildExpr) -> SchemaRef {
    let dt = match b.attr_type {
        AttrType::Double => DataType::Float64,
        AttrType::Int64 => DataType::Int64,
    };
    Arc::new(Schema::new(vec![Field::new(&b.attr_name, dt, false)]))
}

/// Materialize a build expression into record batches.
///
/// Without an explicit chunk interval the whole dimension range becomes one
/// chunk, capped at `default_chunk_rows`. The range size is checked against
/// `max_cells` before anything is allocated.
pub fn materialize(
    b: &BuildExpr,
    default_chunk_rows: usize,
    max_cells: u64,
) -> Result<Vec<RecordBatch>, QueryError> {
    // hi >= lo is guaranteed by the parser; the subtraction can still
    // overflow i64 for ranges spanning most of the dimension space.
    let total = b
        .hi
        .checked_sub(b.lo)
        .and_then(|d| d.checked_add(1))
        .filter(|&n| n as u64 <= max_cells)
        .ok_or_else(|| {
            QueryError::Eval(format!(
                "dimension range [{}:{}] exceeds {} cells",
                b.lo, b.hi, max_cells
            ))
        })? as usize;
    let chunk = b.chunk.unwrap_or(total).min(default_chunk_rows).max(1);
    let schema = build_schema(b);

    let mut batches = Vec::with_capacity(total.div_ceil(chunk));
    for start in (0..total).step_by(chunk) {
        let n = chunk.min(total - start);
        let base = b.lo + start as i64;
        let col: ArrayRef = match b.attr_type {
            AttrType::Double => {
                let values: Float64Array = (0..n)
                    .map(|k| eval_expr(&b.expr, base + k as i64))
                    .collect::<Vec<f64>>()
                    .into();
                Arc::new(values)
            }
            AttrType::Int64 => {
                let values: Int64Array = (0..n)
                    .map(|k| eval_expr(&b.expr, base + k as i64) as i64)
                    .collect::<Vec<i64>>()
                    .into();
                Arc::new(values)
            }
        };
        let batch = RecordBatch::try_new(schema.clone(), vec![col])
            .map_err(|e| QueryError::Eval(e.to_string()))?;
        batches.push(batch);
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::{parse_query, QueryExpr};
    use arrow::array::{Float64Array, Int64Array};

    fn build(src: &str) -> BuildExpr {
        match parse_query(src).unwrap() {
            QueryExpr::Build(b) => b,
            other => panic!("expected build, got {other:?}"),
        }
    }

    #[test]
    fn identity_over_dimension() {
        let batches = materialize(&build("build(<x:double>[i=1:5], i)"), 1_000_000, 1 << 32).unwrap();
        assert_eq!(batches.len(), 1);
        let col = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(col.values(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn explicit_chunk_interval() {
        let batches = materialize(&build("build(<x:double>[i=0:9,4], i)"), 1_000_000, 1 << 32).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].num_rows(), 4);
        assert_eq!(batches[2].num_rows(), 2);
    }

    #[test]
    fn default_chunk_cap_applies() {
        let batches = materialize(&build("build(<x:double>[i=1:10], i)"), 3, 1 << 32).unwrap();
        assert_eq!(batches.len(), 4);
    }

    #[test]
    fn int64_attribute_truncates() {
        let batches = materialize(&build("build(<v:int64>[k=1:3], k / 2)"), 1_000_000, 1 << 32).unwrap();
        let col = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(col.values(), &[0, 1, 1]);
    }

    #[test]
    fn overflowing_range_is_rejected() {
        let b = build("build(<x:double>[i=-2:9223372036854775806], i)");
        let err = materialize(&b, 1_000_000, 1 << 32).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn range_above_cell_cap_is_rejected() {
        let b = build("build(<x:double>[i=1:100000000000], i)");
        assert!(materialize(&b, 1_000_000, 100_000_000).is_err());
    }

    #[test]
    fn range_at_cell_cap_materializes() {
        let batches = materialize(&build("build(<x:double>[i=1:10], i)"), 1_000_000, 10).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 10);
    }

    #[test]
    fn arithmetic() {
        let batches =
            materialize(&build("build(<x:double>[i=1:3], i * 2 - 1)"), 1_000_000, 1 << 32).unwrap();
        let col = batches[0]
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(col.values(), &[1.0, 3.0, 5.0]);
    }
}
