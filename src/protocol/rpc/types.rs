//! RPC protocol type definitions.

/// Hello request from client.
#[derive(Debug)]
pub struct HelloReq {
    pub protocol_version: u32,
    pub username: String,
    #[allow(dead_code)]
    pub password: String,
}

/// Upload request: store raw bytes as a named array.
pub struct UploadReq {
    /// Requested array name; empty means the server assigns one.
    pub name: String,
    pub data: Vec<u8>,
}

/// Stream query request.
#[derive(Debug)]
pub struct QueryReq {
    /// Array expression producing the input (`build(...)` or a stored name).
    pub expr: String,
    /// Shell command executed as the child process.
    pub command: String,
    /// `key=value` stream options (`format=`, `types=`, `names=`).
    pub options: Vec<String>,
    /// Name of a stored array broadcast to the child before the data;
    /// empty means none.
    pub payload: String,
}

/// Capability limits for upload operations.
pub struct UploadCaps {
    pub max_name_bytes: usize,
    pub max_data_bytes: usize,
}

/// Capability limits for stream query operations.
pub struct QueryCaps {
    pub max_expr_bytes: usize,
    pub max_command_bytes: usize,
    pub max_options: usize,
    pub max_option_bytes: usize,
    pub max_name_bytes: usize,
}

/// One catalog entry in a List response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub rows: u64,
    pub chunks: u32,
}
