//! Binary RPC protocol implementation.
//!
//! Client-facing protocol of the array store: handshake, payload upload,
//! stream queries and catalog maintenance.

mod decoder;
mod encoder;
mod types;

pub use decoder::*;
pub use encoder::*;
pub use types::*;

// Message type constants
pub const MSG_HELLO: u8 = 0x01;
pub const MSG_HELLO_OK: u8 = 0x02;
pub const MSG_FAIL: u8 = 0x03;
pub const MSG_UPLOAD: u8 = 0x10;
pub const MSG_UPLOAD_OK: u8 = 0x11;
pub const MSG_QUERY: u8 = 0x12;
pub const MSG_QUERY_OK: u8 = 0x13;
pub const MSG_FETCH: u8 = 0x14;
pub const MSG_FETCH_OK: u8 = 0x15;
pub const MSG_REMOVE: u8 = 0x16;
pub const MSG_REMOVE_OK: u8 = 0x17;
pub const MSG_LIST: u8 = 0x18;
pub const MSG_LIST_OK: u8 = 0x19;

// Feature bits advertised in HELLO_OK
pub const FEATURE_REMOVE: u32 = 0x02;
