//! Network layer: framing, budgets, connection handling and the TCP server.

pub mod budget;
pub mod frame;
pub mod handler;
pub mod server;

pub use server::{serve_on, serve_rpc};
