//! Wire protocol: framing codec, packed function payloads and the RPC
//! message set.

pub mod codec;
pub mod funcspec;
pub mod rpc;

pub use funcspec::FunctionSpec;
