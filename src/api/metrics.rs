//! Global metrics collection using atomic counters with sled persistence.

use log::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Keys for persisted metrics in sled
const KEY_START_TIME: &[u8] = b"start_time";
const KEY_ARRAYS: &[u8] = b"arrays";
const KEY_STORAGE_BYTES: &[u8] = b"storage_bytes";
const KEY_UPLOADS: &[u8] = b"uploads";
const KEY_STREAM_QUERIES: &[u8] = b"stream_queries";
const KEY_CHILD_SPAWNS: &[u8] = b"child_spawns";
const KEY_FETCHES: &[u8] = b"fetches";
const KEY_REMOVES: &[u8] = b"removes";
const KEY_BYTES_STREAMED: &[u8] = b"bytes_streamed";
const KEY_ERRORS: &[u8] = b"errors";
const KEY_TIMEOUTS: &[u8] = b"timeouts";
const KEY_DECODER_REJECTS: &[u8] = b"decoder_rejects";

/// Global metrics structure with persistent backing.
pub struct Metrics {
    // Sled tree for persistence (initialized via init())
    tree: OnceLock<sled::Tree>,

    // === Session metrics (reset on restart) ===
    active_connections: AtomicU64,

    // === Catalog gauges ===
    pub start_time: AtomicU64,
    pub arrays: AtomicU64,
    pub storage_bytes: AtomicU64,

    // === Traffic counters (persisted) ===
    pub uploads: AtomicU64,
    pub stream_queries: AtomicU64,
    pub child_spawns: AtomicU64,
    pub fetches: AtomicU64,
    pub removes: AtomicU64,
    pub bytes_streamed: AtomicU64,

    // === Error counters (persisted) ===
    pub errors: AtomicU64,
    pub timeouts: AtomicU64,
    pub decoder_rejects: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            tree: OnceLock::new(),
            active_connections: AtomicU64::new(0),
            start_time: AtomicU64::new(0),
            arrays: AtomicU64::new(0),
            storage_bytes: AtomicU64::new(0),
            uploads: AtomicU64::new(0),
            stream_queries: AtomicU64::new(0),
            child_spawns: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            removes: AtomicU64::new(0),
            bytes_streamed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            decoder_rejects: AtomicU64::new(0),
        }
    }
}

/// Global metrics singleton.
pub static METRICS: once_cell::sync::Lazy<&'static Metrics> =
    once_cell::sync::Lazy::new(|| Box::leak(Box::new(Metrics::default())));

impl Metrics {
    /// Initialize metrics with sled persistence and load persisted values.
    pub fn init(&self, db: &sled::Db) {
        let tree = match db.open_tree("metrics") {
            Ok(t) => t,
            Err(e) => {
                warn!("metrics persistence unavailable: {e}");
                return;
            }
        };

        self.load_u64(&tree, KEY_UPLOADS, &self.uploads);
        self.load_u64(&tree, KEY_STREAM_QUERIES, &self.stream_queries);
        self.load_u64(&tree, KEY_CHILD_SPAWNS, &self.child_spawns);
        self.load_u64(&tree, KEY_FETCHES, &self.fetches);
        self.load_u64(&tree, KEY_REMOVES, &self.removes);
        self.load_u64(&tree, KEY_BYTES_STREAMED, &self.bytes_streamed);
        self.load_u64(&tree, KEY_ERRORS, &self.errors);
        self.load_u64(&tree, KEY_TIMEOUTS, &self.timeouts);
        self.load_u64(&tree, KEY_DECODER_REJECTS, &self.decoder_rejects);

        // Load or set start_time
        if let Ok(Some(v)) = tree.get(KEY_START_TIME) {
            if v.len() >= 8 {
                let ts = u64::from_le_bytes(v[0..8].try_into().unwrap());
                self.start_time.store(ts, Ordering::Relaxed);
                info!("loaded persisted start_time: {}", ts);
            }
        } else {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            self.start_time.store(now, Ordering::Relaxed);
            let _ = tree.insert(KEY_START_TIME, &now.to_le_bytes());
            info!("initialized start_time: {}", now);
        }

        let _ = self.tree.set(tree);
    }

    fn load_u64(&self, tree: &sled::Tree, key: &[u8], target: &AtomicU64) {
        if let Ok(Some(v)) = tree.get(key) {
            if v.len() >= 8 {
                let val = u64::from_le_bytes(v[0..8].try_into().unwrap());
                target.store(val, Ordering::Relaxed);
            }
        }
    }

    fn persist_u64(&self, key: &[u8], value: u64) {
        if let Some(tree) = self.tree.get() {
            let _ = tree.insert(key, &value.to_le_bytes());
        }
    }

    // === Connection tracking ===

    pub fn conn_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conn_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed) as usize
    }

    // === Increment helpers with persistence ===

    pub fn inc_uploads(&self) {
        let new_val = self.uploads.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_UPLOADS, new_val);
    }

    pub fn inc_stream_queries(&self) {
        let new_val = self.stream_queries.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_STREAM_QUERIES, new_val);
    }

    pub fn inc_child_spawns(&self) {
        let new_val = self.child_spawns.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_CHILD_SPAWNS, new_val);
    }

    pub fn inc_fetches(&self) {
        let new_val = self.fetches.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_FETCHES, new_val);
    }

    pub fn inc_removes(&self) {
        let new_val = self.removes.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_REMOVES, new_val);
    }

    pub fn add_bytes_streamed(&self, n: u64) {
        let new_val = self.bytes_streamed.fetch_add(n, Ordering::Relaxed) + n;
        self.persist_u64(KEY_BYTES_STREAMED, new_val);
    }

    pub fn inc_errors(&self) {
        let new_val = self.errors.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_ERRORS, new_val);
    }

    pub fn inc_timeouts(&self) {
        let new_val = self.timeouts.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_TIMEOUTS, new_val);
    }

    pub fn inc_decoder_rejects(&self) {
        let new_val = self.decoder_rejects.fetch_add(1, Ordering::Relaxed) + 1;
        self.persist_u64(KEY_DECODER_REJECTS, new_val);
    }

    // === Catalog gauge updates ===

    pub fn set_arrays(&self, n: u64) {
        self.arrays.store(n, Ordering::Relaxed);
        self.persist_u64(KEY_ARRAYS, n);
    }

    pub fn set_storage_bytes(&self, n: u64) {
        self.storage_bytes.store(n, Ordering::Relaxed);
        self.persist_u64(KEY_STORAGE_BYTES, n);
    }

    /// Get current uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        let start = self.start_time.load(Ordering::Relaxed);
        if start == 0 {
            return 0;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_sub(start)
    }

    /// Render metrics in Prometheus exposition format.
    pub fn render_prometheus(&self) -> String {
        let g = |name: &str, help: &str, val: u64| -> String {
            format!(
                "# HELP {0} {1}\n# TYPE {0} counter\n{0} {2}\n",
                name, help, val
            )
        };
        let gauge = |name: &str, help: &str, val: u64| -> String {
            format!(
                "# HELP {0} {1}\n# TYPE {0} gauge\n{0} {2}\n",
                name, help, val
            )
        };

        let mut s = String::with_capacity(2048);

        // Catalog stats (gauges)
        s.push_str(&gauge(
            "strumok_arrays",
            "Arrays in the catalog",
            self.arrays.load(Ordering::Relaxed),
        ));
        s.push_str(&gauge(
            "strumok_storage_bytes",
            "Bytes used by stored array files",
            self.storage_bytes.load(Ordering::Relaxed),
        ));
        s.push_str(&gauge(
            "strumok_uptime_seconds",
            "Server uptime in seconds",
            self.uptime_secs(),
        ));
        s.push_str(&gauge(
            "strumok_active_connections",
            "Active binary RPC connections",
            self.active_connections.load(Ordering::Relaxed),
        ));

        // Traffic counters
        s.push_str(&g(
            "strumok_uploads_total",
            "Payload arrays uploaded",
            self.uploads.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_stream_queries_total",
            "Stream queries completed",
            self.stream_queries.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_child_spawns_total",
            "Stream child processes spawned",
            self.child_spawns.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_fetches_total",
            "Arrays fetched",
            self.fetches.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_removes_total",
            "Arrays removed",
            self.removes.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_bytes_streamed_total",
            "Result bytes produced by stream queries",
            self.bytes_streamed.load(Ordering::Relaxed),
        ));

        // Error counters
        s.push_str(&g(
            "strumok_errors_total",
            "Errors",
            self.errors.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_timeouts_total",
            "Timeouts",
            self.timeouts.load(Ordering::Relaxed),
        ));
        s.push_str(&g(
            "strumok_decoder_rejects_total",
            "Protocol decoder rejections due to size limits",
            self.decoder_rejects.load(Ordering::Relaxed),
        ));
        s
    }
}
