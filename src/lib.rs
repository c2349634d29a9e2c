#![deny(clippy::all)]
#![warn(unused_crate_dependencies)]

pub mod api;
pub mod client;
pub mod common;
pub mod config;
pub mod db;
pub mod engine;
pub mod net;
pub mod protocol;
pub mod query;
pub mod stream;
