//! Async database facade over the array store.
//!
//! Sled and file I/O are blocking, so store calls run on the blocking pool.
//! Stream queries drive the child exchange on the async runtime directly.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arrow::record_batch::RecordBatch;
use log::{debug, info, warn};
use tokio::time::timeout;

use crate::api::metrics::METRICS;
use crate::config::Config;
use crate::engine::ArrayStore;
use crate::protocol::rpc::{ListEntry, QueryReq};
use crate::query::{self, QueryExpr};
use crate::stream::{child, feather, ChildProc, Format, StreamSettings};

pub struct Database {
    store: Arc<ArrayStore>,
    cfg: Config,
}

fn join_to_io(e: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

impl Database {
    /// Open the database and wire up metrics persistence.
    pub fn open(cfg: &Config) -> io::Result<Self> {
        let store = Arc::new(ArrayStore::open(Path::new(&cfg.engine.data_dir))?);
        METRICS.init(store.sled_db());
        METRICS.set_arrays(store.count() as u64);
        METRICS.set_storage_bytes(store.storage_bytes());

        info!("database ready, data_dir={}", cfg.engine.data_dir);
        Ok(Self {
            store,
            cfg: cfg.clone(),
        })
    }

    fn refresh_gauges(&self) {
        METRICS.set_arrays(self.store.count() as u64);
        METRICS.set_storage_bytes(self.store.storage_bytes());
    }

    /// Store uploaded bytes as a one-row binary array. Returns the assigned
    /// name.
    pub async fn upload(&self, name: String, data: Vec<u8>) -> io::Result<String> {
        let store = self.store.clone();
        let name = if name.is_empty() {
            store.generate_name()
        } else {
            name
        };

        let batch = feather::wrap_payload(&data)?;
        let stored_name = name.clone();
        tokio::task::spawn_blocking(move || store.put(&stored_name, &[batch]))
            .await
            .map_err(join_to_io)??;

        METRICS.inc_uploads();
        self.refresh_gauges();
        Ok(name)
    }

    /// Resolve a query expression into chunks.
    async fn resolve_expr(&self, expr: &str) -> io::Result<Vec<RecordBatch>> {
        match query::parse_query(expr)? {
            QueryExpr::Build(b) => Ok(query::materialize(
                &b,
                self.cfg.stream.chunk_rows,
                self.cfg.stream.max_build_cells,
            )?),
            QueryExpr::Ref(name) => {
                let store = self.store.clone();
                let lookup = name.clone();
                let batches = tokio::task::spawn_blocking(move || store.get(&lookup))
                    .await
                    .map_err(join_to_io)??;
                batches.ok_or_else(|| crate::common::QueryError::NoSuchArray(name).into())
            }
        }
    }

    /// Execute a stream query end to end and return the result as Arrow IPC
    /// stream bytes.
    pub async fn stream_query(&self, req: QueryReq) -> io::Result<Vec<u8>> {
        let settings = StreamSettings::parse(&req.options)?;

        let input = self.resolve_expr(&req.expr).await?;

        let payload = if req.payload.is_empty() {
            None
        } else {
            if settings.format == Format::Tsv {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "payload broadcast requires feather format",
                ));
            }
            let store = self.store.clone();
            let name = req.payload.clone();
            let batches = tokio::task::spawn_blocking(move || store.get(&name))
                .await
                .map_err(join_to_io)??;
            Some(
                batches
                    .ok_or_else(|| crate::common::QueryError::NoSuchArray(req.payload.clone()))?,
            )
        };

        let mut child = ChildProc::spawn(&self.cfg.stream.child_shell, &req.command)?;
        METRICS.inc_child_spawns();

        let deadline = Duration::from_millis(self.cfg.limits.stream_timeout_ms);
        let exchange = async {
            let out = match settings.format {
                Format::Feather => {
                    child::run_feather(
                        &mut child,
                        payload.as_deref(),
                        &input,
                        &settings,
                        self.cfg.stream.max_child_message_bytes,
                    )
                    .await?
                }
                Format::Tsv => {
                    child::run_tsv(&mut child, &input, self.cfg.stream.max_child_lines).await?
                }
            };
            child.finish().await?;
            Ok::<_, io::Error>(out)
        };

        let out = match timeout(deadline, exchange).await {
            Ok(r) => r?,
            Err(_) => {
                METRICS.inc_timeouts();
                warn!("stream query timed out after {deadline:?}");
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "stream child timed out",
                ));
            }
        };

        if out.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "child produced no output",
            ));
        }

        let ipc = feather::encode_ipc(&out)?;
        METRICS.inc_stream_queries();
        METRICS.add_bytes_streamed(ipc.len() as u64);
        debug!("stream query done: {} chunks, {} bytes", out.len(), ipc.len());
        Ok(ipc)
    }

    /// Fetch a stored array as Arrow IPC stream bytes.
    pub async fn fetch(&self, name: String) -> io::Result<Vec<u8>> {
        let store = self.store.clone();
        let lookup = name.clone();
        let batches = tokio::task::spawn_blocking(move || store.get(&lookup))
            .await
            .map_err(join_to_io)??
            .ok_or_else(|| io::Error::from(crate::common::QueryError::NoSuchArray(name)))?;

        METRICS.inc_fetches();
        Ok(feather::encode_ipc(&batches)?)
    }

    /// Remove a stored array. Returns whether it existed.
    pub async fn remove(&self, name: String) -> io::Result<bool> {
        let store = self.store.clone();
        let existed = tokio::task::spawn_blocking(move || store.remove(&name))
            .await
            .map_err(join_to_io)??;

        if existed {
            METRICS.inc_removes();
            self.refresh_gauges();
        }
        Ok(existed)
    }

    /// List the catalog.
    pub async fn list(&self) -> io::Result<Vec<ListEntry>> {
        let store = self.store.clone();
        let entries = tokio::task::spawn_blocking(move || store.list())
            .await
            .map_err(join_to_io)??;

        Ok(entries
            .into_iter()
            .map(|e| ListEntry {
                name: e.name,
                rows: e.meta.rows,
                chunks: e.meta.chunks,
            })
            .collect())
    }

    /// Catalog access for the HTTP API.
    pub fn store(&self) -> &Arc<ArrayStore> {
        &self.store
    }
}
