//! Child process stream execution.
//!
//! A stream query materializes an array expression, spawns the requested
//! command as a child process and pipes the chunks through it, collecting
//! the child's responses as the query result.

pub mod child;
pub mod feather;
pub mod functions;
pub mod runner;
pub mod settings;
pub mod tsv;

pub use child::ChildProc;
pub use settings::{Format, OutputType, StreamSettings};
