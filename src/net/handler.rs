//! Client connection handler.
//!
//! Handles the handshake and the request/response loop for one connected
//! client.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::*;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::api::metrics::METRICS;
use crate::common::hash::hex_dump;
use crate::config::Config;
use crate::db::Database;
use crate::protocol::rpc::{
    decode_fetch, decode_hello, decode_query, decode_remove, decode_upload, encode_fail,
    encode_fetch_ok, encode_hello_ok, encode_list_ok, encode_query_ok, encode_remove_ok,
    encode_upload_ok, QueryCaps, UploadCaps, FEATURE_REMOVE, MSG_FETCH, MSG_HELLO, MSG_LIST,
    MSG_QUERY, MSG_REMOVE, MSG_UPLOAD,
};

use super::budget::Budget;
use super::frame::read_frame_bounded;

/// Write all bytes to the stream.
#[inline]
pub async fn write_all<W: AsyncWrite + Unpin>(w: &mut W, buf: &[u8]) -> io::Result<()> {
    write_all_chunked(w, buf).await
}

/// Write bytes in chunks with yield points to prevent worker thread
/// starvation when shipping large IPC responses.
async fn write_all_chunked<W: AsyncWrite + Unpin>(w: &mut W, buf: &[u8]) -> io::Result<()> {
    const CHUNK_SIZE: usize = 64 * 1024;

    if buf.len() <= CHUNK_SIZE {
        return w.write_all(buf).await;
    }

    let mut offset = 0;
    while offset < buf.len() {
        let end = (offset + CHUNK_SIZE).min(buf.len());
        w.write_all(&buf[offset..end]).await?;
        offset = end;
        if offset < buf.len() {
            tokio::task::yield_now().await;
        }
    }

    Ok(())
}

/// Supported protocol version.
pub const PROTOCOL_VERSION: u32 = 1;

/// Handle a single client connection.
pub async fn handle_client<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    mut stream: S,
    cfg: Arc<Config>,
    db: Arc<Database>,
    global_budget: Arc<Budget>,
) -> io::Result<()> {
    let conn_budget = Arc::new(Budget::new(cfg.limits.per_connection_inflight_bytes));

    let hello_frame = match timeout(
        Duration::from_millis(cfg.limits.hello_timeout_ms),
        read_frame_bounded(
            &mut stream,
            cfg.limits.max_hello_frame_bytes,
            &conn_budget,
            &global_budget,
        ),
    )
    .await
    {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            METRICS.inc_timeouts();
            return Ok(());
        }
    };

    let hello_bytes = hello_frame.as_slice();
    debug!("received hello message, {} bytes", hello_bytes.len());
    if log_enabled!(log::Level::Trace) {
        trace!("hello frame hex dump:\n{}", hex_dump(hello_bytes, 256));
    }

    if hello_bytes.is_empty() || hello_bytes[0] != MSG_HELLO {
        write_all(&mut stream, &encode_fail(0, "bad sequence")).await?;
        return Ok(());
    }

    let hello = match decode_hello(&hello_bytes[1..]) {
        Ok(v) => v,
        Err(_) => {
            write_all(&mut stream, &encode_fail(0, "invalid hello")).await?;
            return Ok(());
        }
    };

    debug!(
        "hello: protocol_version={}, username={}",
        hello.protocol_version, hello.username
    );

    if hello.protocol_version != PROTOCOL_VERSION {
        let msg = format!(
            "{}: unsupported protocol version {}",
            cfg.server.server_name, hello.protocol_version
        );
        write_all(&mut stream, &encode_fail(1, &msg)).await?;
        return Ok(());
    }

    if hello.username != "guest" {
        let msg = format!(
            "{}: invalid username or password. Try logging in with `guest` instead.",
            cfg.server.server_name
        );
        write_all(&mut stream, &encode_fail(1, &msg)).await?;
        return Ok(());
    }

    let mut features = 0u32;
    if cfg.server.allow_remove {
        features |= FEATURE_REMOVE;
    }
    write_all(&mut stream, &encode_hello_ok(features)).await?;

    // Main request/response loop
    loop {
        let frame = match timeout(
            Duration::from_millis(cfg.limits.command_timeout_ms),
            read_frame_bounded(
                &mut stream,
                cfg.limits.max_cmd_frame_bytes,
                &conn_budget,
                &global_budget,
            ),
        )
        .await
        {
            Ok(Ok(v)) => v,
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Ok(Err(e)) => {
                error!("read error: {}", e);
                return Ok(());
            }
            Err(_) => {
                METRICS.inc_timeouts();
                write_all(
                    &mut stream,
                    &encode_fail(
                        0,
                        &format!("{} client idle for too long.\n", cfg.server.server_name),
                    ),
                )
                .await
                .ok();
                return Ok(());
            }
        };

        let frame_bytes = frame.as_slice();
        let typ = frame_bytes[0];
        let pld = &frame_bytes[1..];

        debug!(
            "incoming message: type=0x{:02x}, payload_size={}",
            typ,
            pld.len()
        );

        handle_command(&mut stream, &cfg, &db, typ, pld).await?;
    }
}

/// Handle one command frame.
async fn handle_command<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    cfg: &Config,
    db: &Database,
    typ: u8,
    pld: &[u8],
) -> io::Result<()> {
    match typ {
        MSG_UPLOAD => handle_upload(stream, cfg, db, pld).await,
        MSG_QUERY => handle_query(stream, cfg, db, pld).await,
        MSG_FETCH => handle_fetch(stream, cfg, db, pld).await,
        MSG_REMOVE => handle_remove(stream, cfg, db, pld).await,
        MSG_LIST => handle_list(stream, db).await,
        _ => {
            warn!("unknown command: 0x{:02x}", typ);
            write_all(
                stream,
                &encode_fail(0, &format!("{}: Unknown command.", cfg.server.server_name)),
            )
            .await
        }
    }
}

async fn handle_upload<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    cfg: &Config,
    db: &Database,
    pld: &[u8],
) -> io::Result<()> {
    let caps = UploadCaps {
        max_name_bytes: cfg.limits.max_name_bytes,
        max_data_bytes: cfg.limits.max_upload_bytes,
    };
    let req = match decode_upload(pld, &caps) {
        Ok(v) => v,
        Err(e) => {
            return write_all(stream, &encode_fail(0, &format!("bad upload: {e}"))).await;
        }
    };

    match db.upload(req.name, req.data).await {
        Ok(name) => write_all(stream, &encode_upload_ok(&name)).await,
        Err(e) => {
            METRICS.inc_errors();
            write_all(stream, &encode_fail(0, &e.to_string())).await
        }
    }
}

async fn handle_query<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    cfg: &Config,
    db: &Database,
    pld: &[u8],
) -> io::Result<()> {
    let caps = QueryCaps {
        max_expr_bytes: cfg.limits.max_expr_bytes,
        max_command_bytes: cfg.limits.max_command_bytes,
        max_options: cfg.limits.max_options,
        max_option_bytes: cfg.limits.max_option_bytes,
        max_name_bytes: cfg.limits.max_name_bytes,
    };
    let req = match decode_query(pld, &caps) {
        Ok(v) => v,
        Err(e) => {
            return write_all(stream, &encode_fail(0, &format!("bad query: {e}"))).await;
        }
    };

    match db.stream_query(req).await {
        Ok(ipc) => write_all(stream, &encode_query_ok(&ipc)).await,
        Err(e) => {
            METRICS.inc_errors();
            write_all(stream, &encode_fail(0, &e.to_string())).await
        }
    }
}

async fn handle_fetch<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    cfg: &Config,
    db: &Database,
    pld: &[u8],
) -> io::Result<()> {
    let name = match decode_fetch(pld, cfg.limits.max_name_bytes) {
        Ok(v) => v,
        Err(e) => {
            return write_all(stream, &encode_fail(0, &format!("bad fetch: {e}"))).await;
        }
    };

    match db.fetch(name).await {
        Ok(ipc) => write_all(stream, &encode_fetch_ok(&ipc)).await,
        Err(e) => write_all(stream, &encode_fail(0, &e.to_string())).await,
    }
}

async fn handle_remove<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    cfg: &Config,
    db: &Database,
    pld: &[u8],
) -> io::Result<()> {
    if !cfg.server.allow_remove {
        return write_all(
            stream,
            &encode_fail(
                0,
                &format!("{}: removes are disabled.", cfg.server.server_name),
            ),
        )
        .await;
    }

    let name = match decode_remove(pld, cfg.limits.max_name_bytes) {
        Ok(v) => v,
        Err(e) => {
            return write_all(stream, &encode_fail(0, &format!("bad remove: {e}"))).await;
        }
    };

    match db.remove(name).await {
        Ok(true) => write_all(stream, &encode_remove_ok()).await,
        Ok(false) => write_all(stream, &encode_fail(0, "no such array")).await,
        Err(e) => {
            METRICS.inc_errors();
            write_all(stream, &encode_fail(0, &e.to_string())).await
        }
    }
}

async fn handle_list<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
    stream: &mut S,
    db: &Database,
) -> io::Result<()> {
    match db.list().await {
        Ok(entries) => write_all(stream, &encode_list_ok(&entries)).await,
        Err(e) => {
            METRICS.inc_errors();
            write_all(stream, &encode_fail(0, &e.to_string())).await
        }
    }
}
