//! Versioned interchange format for packed function payloads.
//!
//! A stream query may carry a transformation for the child process to apply.
//! Rather than shipping executable code, the payload names a function in the
//! runner's registry plus its arguments, behind a magic tag and a format
//! version. Unknown versions are rejected on decode so that a client and a
//! runner built from different releases fail loudly instead of misbehaving.

use bytes::{BufMut, BytesMut};

use crate::common::error::CodecError;
use crate::protocol::codec::{get_str_max, get_u32_le, put_str};

const MAGIC: [u8; 3] = *b"SFN";
const VERSION: u8 = 1;

const MAX_NAME_BYTES: usize = 256;
const MAX_ARGS: usize = 64;
const MAX_ARG_BYTES: usize = 4096;

/// A packed function: registry identifier plus string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl FunctionSpec {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Pack into the wire payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut p = BytesMut::with_capacity(16 + self.name.len());
        p.extend_from_slice(&MAGIC);
        p.put_u8(VERSION);
        put_str(&mut p, &self.name);
        p.put_u32_le(self.args.len() as u32);
        for a in &self.args {
            put_str(&mut p, a);
        }
        p.to_vec()
    }

    /// Unpack from a wire payload. Exact inverse of [`encode`](Self::encode).
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut p = payload;

        if p.len() < 4 {
            return Err(CodecError::Short);
        }
        if p[0..3] != MAGIC {
            return Err(CodecError::Malformed("bad function payload magic"));
        }
        if p[3] != VERSION {
            return Err(CodecError::Malformed("unsupported function payload version"));
        }
        p = &p[4..];

        let name = get_str_max(&mut p, MAX_NAME_BYTES)?;
        let n = get_u32_le(&mut p)? as usize;
        if n > MAX_ARGS {
            return Err(CodecError::Malformed("argument count exceeds cap"));
        }

        let mut args = Vec::with_capacity(n);
        for _ in 0..n {
            args.push(get_str_max(&mut p, MAX_ARG_BYTES)?);
        }

        Ok(Self { name, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        let spec = FunctionSpec::new("head", &["1"]);
        let bytes = spec.encode();
        assert_eq!(FunctionSpec::decode(&bytes).unwrap(), spec);
    }

    #[test]
    fn no_args() {
        let spec = FunctionSpec::new("identity", &[]);
        assert_eq!(FunctionSpec::decode(&spec.encode()).unwrap(), spec);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = FunctionSpec::new("head", &["1"]).encode();
        bytes[0] = b'X';
        assert!(matches!(
            FunctionSpec::decode(&bytes),
            Err(CodecError::Malformed("bad function payload magic"))
        ));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = FunctionSpec::new("head", &["1"]).encode();
        bytes[3] = 9;
        assert!(matches!(
            FunctionSpec::decode(&bytes),
            Err(CodecError::Malformed("unsupported function payload version"))
        ));
    }

    #[test]
    fn rejects_truncation() {
        let bytes = FunctionSpec::new("scale", &["2.5"]).encode();
        assert!(FunctionSpec::decode(&bytes[..bytes.len() - 2]).is_err());
    }
}
