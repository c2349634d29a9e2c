//! HTTP request handlers.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http_body_util::Full;
use hyper::{body::Incoming, header, Request, Response, StatusCode};
use log::*;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::sync::Arc;

use crate::api::metrics::METRICS;
use crate::db::Database;

/// One array in the catalog listing.
#[derive(Serialize)]
pub struct ArrayInfo {
    name: String,
    rows: u64,
    chunks: u32,
    created: String,
}

/// Catalog listing response.
#[derive(Serialize)]
pub struct ArraysResponse {
    count: usize,
    arrays: Vec<ArrayInfo>,
}

/// Metrics snapshot for JSON API.
#[derive(Serialize)]
pub struct MetricsSnapshot {
    // Catalog stats
    arrays: u64,
    storage_bytes: u64,
    uptime_secs: u64,
    start_time: u64,

    // Traffic counters
    uploads: u64,
    stream_queries: u64,
    child_spawns: u64,
    fetches: u64,
    removes: u64,
    bytes_streamed: u64,
    active_connections: u64,

    // Error counters
    errors: u64,
    timeouts: u64,
    decoder_rejects: u64,
}

/// Get current metrics snapshot.
pub fn metrics_snapshot() -> MetricsSnapshot {
    use std::sync::atomic::Ordering::Relaxed;
    MetricsSnapshot {
        arrays: METRICS.arrays.load(Relaxed),
        storage_bytes: METRICS.storage_bytes.load(Relaxed),
        uptime_secs: METRICS.uptime_secs(),
        start_time: METRICS.start_time.load(Relaxed),

        uploads: METRICS.uploads.load(Relaxed),
        stream_queries: METRICS.stream_queries.load(Relaxed),
        child_spawns: METRICS.child_spawns.load(Relaxed),
        fetches: METRICS.fetches.load(Relaxed),
        removes: METRICS.removes.load(Relaxed),
        bytes_streamed: METRICS.bytes_streamed.load(Relaxed),
        active_connections: METRICS.active_connections() as u64,

        errors: METRICS.errors.load(Relaxed),
        timeouts: METRICS.timeouts.load(Relaxed),
        decoder_rejects: METRICS.decoder_rejects.load(Relaxed),
    }
}

/// Parse a query parameter from a request.
pub fn parse_query_param(req: &Request<Incoming>, key: &str) -> Option<String> {
    let query = req.uri().query()?;
    for pair in query.split('&') {
        let mut it = pair.splitn(2, '=');
        let k = it.next()?;
        if k == key {
            let raw = it.next().unwrap_or_default();
            return percent_decode_str(raw)
                .decode_utf8()
                .ok()
                .map(|s| s.into_owned());
        }
    }
    None
}

/// Create a JSON response.
pub fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut r = Response::new(Full::new(Bytes::from(body)));
            *r.status_mut() = status;
            r.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json"),
            );
            r
        }
        Err(e) => {
            error!("json serialize error: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::from_static(
                    b"{\"error\":\"serialization\"}",
                )))
                .unwrap()
        }
    }
}

fn format_ts(ts: u64) -> String {
    Utc.timestamp_opt(ts as i64, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Handle the catalog listing API. An optional `name=` parameter narrows
/// the listing to a prefix.
pub async fn handle_arrays(db: Arc<Database>, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let prefix = parse_query_param(&req, "name");

    let store = db.store().clone();
    let listed = tokio::task::spawn_blocking(move || store.list())
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        .and_then(|r| r);
    let entries = match listed {
        Ok(v) => v,
        Err(e) => {
            error!("catalog listing failed: {}", e);
            return json_response(
                &serde_json::json!({"error": "catalog listing failed"}),
                StatusCode::INTERNAL_SERVER_ERROR,
            );
        }
    };

    let arrays: Vec<ArrayInfo> = entries
        .into_iter()
        .filter(|e| match &prefix {
            Some(p) => e.name.starts_with(p.as_str()),
            None => true,
        })
        .map(|e| ArrayInfo {
            name: e.name,
            rows: e.meta.rows,
            chunks: e.meta.chunks,
            created: format_ts(e.meta.created_ts),
        })
        .collect();

    json_response(
        &ArraysResponse {
            count: arrays.len(),
            arrays,
        },
        StatusCode::OK,
    )
}
