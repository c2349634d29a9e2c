//! Bounded frame reading.
//!
//! Wire frames are a 4-byte big-endian length followed by a 1-byte message
//! type and the payload; the length field covers the type byte and payload.
//! The returned buffer starts with the type byte.

use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use super::budget::{Budget, OwnedFrame};

/// Read one frame with budget-limited memory allocation.
pub async fn read_frame_bounded<R: tokio::io::AsyncRead + Unpin>(
    r: &mut R,
    max_len_field: usize,
    conn_budget: &Arc<Budget>,
    global_budget: &Arc<Budget>,
) -> io::Result<OwnedFrame> {
    let mut head = [0u8; 5];
    r.read_exact(&mut head[..4]).await?;
    let len_field = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;

    if len_field == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid length"));
    }
    if len_field > max_len_field {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame too large",
        ));
    }

    r.read_exact(&mut head[4..5]).await?;

    let g1 = conn_budget.try_reserve(len_field).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Other,
            "per-connection memory budget exceeded",
        )
    })?;
    let g2 = global_budget
        .try_reserve(len_field)
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "global memory budget exceeded"))?;

    let mut data = vec![0u8; len_field];
    data[0] = head[4];
    r.read_exact(&mut data[1..]).await?;

    Ok(OwnedFrame::new(data, g1, g2))
}
