//! Low-level binary serialization primitives.
//!
//! Wire protocol uses big-endian (network byte order) for the frame length
//! prefix, and little-endian for internal data fields.

use crate::common::error::CodecError;
use bytes::{BufMut, BytesMut};

/// Read a u32 in little-endian format.
pub fn get_u32_le(src: &mut &[u8]) -> Result<u32, CodecError> {
    if src.len() < 4 {
        return Err(CodecError::Short);
    }

    let v = u32::from_le_bytes(src[0..4].try_into().unwrap());

    *src = &src[4..];

    Ok(v)
}

/// Read a u64 in little-endian format.
pub fn get_u64_le(src: &mut &[u8]) -> Result<u64, CodecError> {
    if src.len() < 8 {
        return Err(CodecError::Short);
    }

    let v = u64::from_le_bytes(src[0..8].try_into().unwrap());

    *src = &src[8..];

    Ok(v)
}

/// Write a length-prefixed string (4-byte LE length + bytes).
pub fn put_str(dst: &mut BytesMut, s: &str) {
    dst.put_u32_le(s.len() as u32);
    dst.extend_from_slice(s.as_bytes());
}

/// Read a length-prefixed string.
pub fn get_str(src: &mut &[u8]) -> Result<String, CodecError> {
    let len = get_u32_le(src)? as usize;

    if src.len() < len {
        return Err(CodecError::Short);
    }

    let s = std::str::from_utf8(&src[..len]).map_err(|_| CodecError::Malformed("utf8"))?;

    *src = &src[len..];

    Ok(s.to_string())
}

/// Read a length-prefixed string with maximum length enforcement.
pub fn get_str_max(src: &mut &[u8], max_len: usize) -> Result<String, CodecError> {
    if src.len() < 4 {
        return Err(CodecError::Short);
    }

    let len = u32::from_le_bytes(src[0..4].try_into().unwrap()) as usize;

    if len > max_len {
        return Err(CodecError::Malformed("string too large"));
    }

    get_str(src)
}

/// Write a length-prefixed byte array (4-byte LE length + bytes).
pub fn put_bytes(dst: &mut BytesMut, b: &[u8]) {
    dst.put_u32_le(b.len() as u32);
    dst.extend_from_slice(b);
}

/// Read a length-prefixed byte array with maximum length enforcement.
pub fn get_bytes_max(src: &mut &[u8], max_len: usize) -> Result<Vec<u8>, CodecError> {
    if src.len() < 4 {
        return Err(CodecError::Short);
    }

    let len = u32::from_le_bytes(src[0..4].try_into().unwrap()) as usize;

    if len > max_len {
        return Err(CodecError::Malformed("bytes too large"));
    }

    *src = &src[4..];

    if src.len() < len {
        return Err(CodecError::Short);
    }

    let v = src[..len].to_vec();

    *src = &src[len..];

    Ok(v)
}

/// Create a wire-format frame with message type and payload.
pub fn frame(msg_type: u8, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());

    // Wire protocol uses big-endian (network byte order) for length prefix
    buf.put_u32((1 + payload.len()) as u32);
    buf.put_u8(msg_type);
    buf.extend_from_slice(payload);

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_roundtrip() {
        let mut buf = BytesMut::new();
        put_str(&mut buf, "build(<x:double>[i=1:5], i)");
        let mut p = &buf[..];
        assert_eq!(get_str(&mut p).unwrap(), "build(<x:double>[i=1:5], i)");
        assert!(p.is_empty());
    }

    #[test]
    fn str_short_input() {
        let mut p: &[u8] = &[5, 0, 0, 0, b'a'];
        assert!(matches!(get_str(&mut p), Err(CodecError::Short)));
    }

    #[test]
    fn str_max_enforced() {
        let mut buf = BytesMut::new();
        put_str(&mut buf, "0123456789");
        let mut p = &buf[..];
        assert!(matches!(
            get_str_max(&mut p, 4),
            Err(CodecError::Malformed("string too large"))
        ));
    }

    #[test]
    fn bytes_max_enforced() {
        let mut buf = BytesMut::new();
        put_bytes(&mut buf, &[0u8; 64]);
        let mut p = &buf[..];
        assert!(get_bytes_max(&mut p, 32).is_err());
        let mut p = &buf[..];
        assert_eq!(get_bytes_max(&mut p, 64).unwrap().len(), 64);
    }

    #[test]
    fn frame_layout() {
        let f = frame(0x12, b"abc");
        // BE length counts type byte plus payload
        assert_eq!(&f[..4], &4u32.to_be_bytes());
        assert_eq!(f[4], 0x12);
        assert_eq!(&f[5..], b"abc");
    }
}
