//! HTTP API server module.
//!
//! Provides:
//! - Status page at `/`
//! - Catalog API at `/api/arrays`
//! - JSON metrics at `/api/metrics`
//! - Prometheus metrics at `/metrics`

mod handlers;
mod router;
mod templates;

pub use router::serve_http;
