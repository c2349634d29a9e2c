//! RPC protocol message decoders.

use crate::api::metrics::METRICS;
use crate::common::error::CodecError;
use crate::protocol::codec::{get_bytes_max, get_str, get_str_max, get_u32_le};

use super::types::{HelloReq, ListEntry, QueryCaps, QueryReq, UploadCaps, UploadReq};

/// Decode a Hello request.
pub fn decode_hello(payload: &[u8]) -> Result<HelloReq, CodecError> {
    let mut p = payload;

    let pv = get_u32_le(&mut p)?;
    let user = get_str(&mut p)?;
    let pass = get_str(&mut p)?;

    Ok(HelloReq {
        protocol_version: pv,
        username: user,
        password: pass,
    })
}

/// Decode an Upload request.
pub fn decode_upload(payload: &[u8], caps: &UploadCaps) -> Result<UploadReq, CodecError> {
    let mut p = payload;

    let name = match get_str_max(&mut p, caps.max_name_bytes) {
        Ok(s) => s,
        Err(CodecError::Malformed(m)) => {
            METRICS.inc_decoder_rejects();
            return Err(CodecError::Malformed(m));
        }
        Err(e) => return Err(e),
    };
    let data = match get_bytes_max(&mut p, caps.max_data_bytes) {
        Ok(b) => b,
        Err(CodecError::Malformed(m)) => {
            METRICS.inc_decoder_rejects();
            return Err(CodecError::Malformed(m));
        }
        Err(e) => return Err(e),
    };

    Ok(UploadReq { name, data })
}

/// Decode a stream Query request.
pub fn decode_query(payload: &[u8], caps: &QueryCaps) -> Result<QueryReq, CodecError> {
    let mut p = payload;

    let expr = get_str_max(&mut p, caps.max_expr_bytes)?;
    let command = get_str_max(&mut p, caps.max_command_bytes)?;

    let n = get_u32_le(&mut p)? as usize;
    if n > caps.max_options {
        METRICS.inc_decoder_rejects();
        return Err(CodecError::Malformed("option count exceeds cap"));
    }

    let mut options = Vec::with_capacity(n);
    for _ in 0..n {
        options.push(get_str_max(&mut p, caps.max_option_bytes)?);
    }

    let payload_name = get_str_max(&mut p, caps.max_name_bytes)?;

    Ok(QueryReq {
        expr,
        command,
        options,
        payload: payload_name,
    })
}

/// Decode a Fetch request (a single array name).
pub fn decode_fetch(payload: &[u8], max_name_bytes: usize) -> Result<String, CodecError> {
    let mut p = payload;
    get_str_max(&mut p, max_name_bytes)
}

/// Decode a Remove request (same format as Fetch).
pub fn decode_remove(payload: &[u8], max_name_bytes: usize) -> Result<String, CodecError> {
    decode_fetch(payload, max_name_bytes)
}

/// Decode a List OK response (used by the client side).
pub fn decode_list_ok(payload: &[u8]) -> Result<Vec<ListEntry>, CodecError> {
    let mut p = payload;

    let n = get_u32_le(&mut p)? as usize;

    let mut v = Vec::with_capacity(n.min(1024));
    for _ in 0..n {
        let name = get_str(&mut p)?;
        if p.len() < 12 {
            return Err(CodecError::Short);
        }
        let rows = u64::from_le_bytes(p[0..8].try_into().unwrap());
        let chunks = u32::from_le_bytes(p[8..12].try_into().unwrap());
        p = &p[12..];
        v.push(ListEntry { name, rows, chunks });
    }

    Ok(v)
}

/// Decode a Fail response (used by the client side).
pub fn decode_fail(payload: &[u8]) -> Result<(u32, String), CodecError> {
    let mut p = payload;
    let code = get_u32_le(&mut p)?;
    let msg = get_str(&mut p)?;
    Ok((code, msg))
}
