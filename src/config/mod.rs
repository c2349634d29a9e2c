//! Configuration module for strumok.
//!
//! This module provides all configuration types and parsing logic:
//! - `Config` - Root configuration container
//! - `Limits` - Connection and resource limits
//! - `Engine` - Storage engine settings
//! - `Stream` - Child process stream execution settings
//! - `Server` - RPC server settings

mod parser;
mod types;

pub use parser::load_config;
pub use types::*;
