//! Array query expressions: parsing and materialization.

mod eval;
mod parser;

pub use eval::materialize;
pub use parser::{parse_query, AttrType, BuildExpr, Expr, QueryExpr};
