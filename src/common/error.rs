//! Unified error types for the strumok codebase.

use std::fmt;

/// Error type for codec/protocol operations.
#[derive(Debug)]
pub enum CodecError {
    /// Not enough data available
    Short,
    /// Data format is invalid
    Malformed(&'static str),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Short => write!(f, "unexpected end of data"),
            CodecError::Malformed(msg) => write!(f, "malformed data: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

/// Error type for array expression parsing and evaluation.
#[derive(Debug)]
pub enum QueryError {
    /// Expression text could not be parsed
    Parse(String),
    /// Expression parsed but could not be evaluated
    Eval(String),
    /// Referenced array does not exist
    NoSuchArray(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Parse(msg) => write!(f, "parse error: {}", msg),
            QueryError::Eval(msg) => write!(f, "evaluation error: {}", msg),
            QueryError::NoSuchArray(name) => write!(f, "array '{}' does not exist", name),
        }
    }
}

impl std::error::Error for QueryError {}

/// Error type for stream operator and child process exchanges.
#[derive(Debug)]
pub enum StreamError {
    /// Child process could not be spawned
    Spawn(std::io::Error),
    /// I/O failure on the child's pipes
    Io(std::io::Error),
    /// Child violated the exchange protocol
    Protocol(&'static str),
    /// Child exited before the exchange completed
    ChildExited,
    /// Arrow (de)serialization failure
    Arrow(String),
    /// Bad stream options or function arguments
    BadArgs(String),
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        StreamError::Io(e)
    }
}

impl From<arrow::error::ArrowError> for StreamError {
    fn from(e: arrow::error::ArrowError) -> Self {
        StreamError::Arrow(e.to_string())
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Spawn(e) => write!(f, "failed to spawn child: {}", e),
            StreamError::Io(e) => write!(f, "child I/O error: {}", e),
            StreamError::Protocol(msg) => write!(f, "child protocol violation: {}", msg),
            StreamError::ChildExited => write!(f, "child exited early"),
            StreamError::Arrow(msg) => write!(f, "arrow error: {}", msg),
            StreamError::BadArgs(msg) => write!(f, "bad arguments: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Spawn(e) | StreamError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StreamError> for std::io::Error {
    fn from(e: StreamError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    }
}

impl From<QueryError> for std::io::Error {
    fn from(e: QueryError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    }
}
