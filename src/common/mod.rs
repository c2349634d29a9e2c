//! Common utilities shared across the codebase.
//!
//! This module provides foundational types and functions used throughout strumok:
//! - Error types for unified error handling
//! - Time utilities for timestamp operations
//! - Hash helpers and hex dumps for debugging

pub mod error;
pub mod hash;
pub mod time;

// Re-export commonly used items for convenience
pub use error::{CodecError, QueryError, StreamError};
pub use hash::{hex_dump, wyhash64};
pub use time::now_ts_sec;
