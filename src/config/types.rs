//! Configuration type definitions.

/// Connection and resource limits.
#[derive(Clone, Debug)]
pub struct Limits {
    pub hello_timeout_ms: u64,
    pub command_timeout_ms: u64,
    pub stream_timeout_ms: u64,
    pub max_active_conns: usize,
    pub max_hello_frame_bytes: usize,
    pub max_cmd_frame_bytes: usize,
    pub max_name_bytes: usize,
    pub max_upload_bytes: usize,
    pub max_expr_bytes: usize,
    pub max_command_bytes: usize,
    pub max_options: usize,
    pub max_option_bytes: usize,
    pub per_connection_inflight_bytes: usize,
    pub global_inflight_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            hello_timeout_ms: 3000,
            command_timeout_ms: 15000,
            stream_timeout_ms: 60000,
            max_active_conns: 2048,
            max_hello_frame_bytes: 1024 * 1024,
            max_cmd_frame_bytes: 256 * 1024 * 1024,
            max_name_bytes: 256,
            max_upload_bytes: 64 * 1024 * 1024,
            max_expr_bytes: 64 * 1024,
            max_command_bytes: 16 * 1024,
            max_options: 16,
            max_option_bytes: 1024,
            per_connection_inflight_bytes: 32 * 1024 * 1024,
            global_inflight_bytes: 512 * 1024 * 1024,
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug)]
pub struct Http {
    pub bind_addr: String,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
        }
    }
}

/// Storage engine configuration.
#[derive(Clone, Debug)]
pub struct Engine {
    pub data_dir: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
        }
    }
}

/// Child process stream execution configuration.
#[derive(Clone, Debug)]
pub struct Stream {
    /// Shell used to spawn child commands (`<shell> -c <command>`).
    pub child_shell: String,
    /// Default chunk size for materialized expressions, in rows.
    pub chunk_rows: usize,
    /// Largest dimension range a build expression may materialize, in cells.
    pub max_build_cells: u64,
    /// Largest single message accepted from a child, in bytes.
    pub max_child_message_bytes: usize,
    /// Largest TSV block accepted from a child, in lines.
    pub max_child_lines: usize,
}

impl Default for Stream {
    fn default() -> Self {
        Self {
            child_shell: "sh".into(),
            chunk_rows: 1_000_000,
            max_build_cells: 100_000_000,
            max_child_message_bytes: 256 * 1024 * 1024,
            max_child_lines: 16 * 1024 * 1024,
        }
    }
}

/// RPC server configuration.
#[derive(Clone, Debug)]
pub struct Server {
    pub bind_addr: String,
    pub server_name: String,
    pub allow_remove: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6464".into(),
            server_name: "strumok".into(),
            allow_remove: false,
        }
    }
}

/// Root configuration container.
#[derive(Clone, Debug)]
pub struct Config {
    pub limits: Limits,
    pub http: Option<Http>,
    pub engine: Engine,
    pub stream: Stream,
    pub server: Server,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            http: Some(Http::default()),
            engine: Engine::default(),
            stream: Stream::default(),
            server: Server::default(),
        }
    }
}
