//! RPC protocol message encoders.

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncWriteExt;

use super::types::ListEntry;
use super::{MSG_FAIL, MSG_FETCH_OK, MSG_HELLO_OK, MSG_LIST_OK, MSG_QUERY_OK, MSG_REMOVE_OK, MSG_UPLOAD_OK};
use crate::protocol::codec::{frame, put_bytes, put_str};

/// Write all bytes and flush.
pub async fn write_all<W: AsyncWriteExt + Unpin>(w: &mut W, buf: &[u8]) -> std::io::Result<()> {
    w.write_all(buf).await?;
    w.flush().await
}

/// Encode a Fail response.
pub fn encode_fail(code: u32, msg: &str) -> BytesMut {
    let mut p = BytesMut::with_capacity(4 + 4 + msg.len());
    p.put_u32_le(code);
    put_str(&mut p, msg);
    frame(MSG_FAIL, &p)
}

/// Encode a Hello OK response.
pub fn encode_hello_ok(features: u32) -> BytesMut {
    let mut p = BytesMut::with_capacity(4);
    p.put_u32_le(features);
    frame(MSG_HELLO_OK, &p)
}

/// Encode an Upload OK response carrying the assigned array name.
pub fn encode_upload_ok(name: &str) -> BytesMut {
    let mut p = BytesMut::with_capacity(4 + name.len());
    put_str(&mut p, name);
    frame(MSG_UPLOAD_OK, &p)
}

/// Encode a Query OK response carrying the result as Arrow IPC stream bytes.
pub fn encode_query_ok(ipc: &[u8]) -> BytesMut {
    let mut p = BytesMut::with_capacity(4 + ipc.len());
    put_bytes(&mut p, ipc);
    frame(MSG_QUERY_OK, &p)
}

/// Encode a Fetch OK response carrying the stored array as Arrow IPC bytes.
pub fn encode_fetch_ok(ipc: &[u8]) -> BytesMut {
    let mut p = BytesMut::with_capacity(4 + ipc.len());
    put_bytes(&mut p, ipc);
    frame(MSG_FETCH_OK, &p)
}

/// Encode a Remove OK response.
pub fn encode_remove_ok() -> BytesMut {
    frame(MSG_REMOVE_OK, &[])
}

/// Encode a List OK response.
pub fn encode_list_ok(entries: &[ListEntry]) -> BytesMut {
    let mut p = BytesMut::new();
    p.put_u32_le(entries.len() as u32);

    for e in entries {
        put_str(&mut p, &e.name);
        p.put_u64_le(e.rows);
        p.put_u32_le(e.chunks);
    }

    frame(MSG_LIST_OK, &p)
}
