//! Wire-level protocol tests against an in-process server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use strumok::config::Config;
use strumok::db::Database;
use strumok::net::serve_on;

static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

/// Start a server on an ephemeral port with its own temp data dir.
async fn start_server(mutate: impl FnOnce(&mut Config)) -> String {
    let seq = TEST_SEQ.fetch_add(1, Ordering::Relaxed);
    let data_dir = std::env::temp_dir().join(format!(
        "strumok-proto-test-{}-{}",
        std::process::id(),
        seq
    ));

    let mut cfg = Config::default();
    cfg.engine.data_dir = data_dir.to_string_lossy().into_owned();
    cfg.http = None;
    mutate(&mut cfg);

    let db = Arc::new(Database::open(&cfg).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve_on(listener, Arc::new(cfg), db));
    addr
}

// Minimal frame encoder matching the wire protocol
fn frame(msg_type: u8, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + 1 + payload.len());
    // Wire protocol uses big-endian (network byte order) for length prefix
    buf.put_u32((1 + payload.len()) as u32);
    buf.put_u8(msg_type);
    buf.extend_from_slice(payload);
    buf
}

fn encode_hello(protocol_version: u32, username: &str, password: &str) -> BytesMut {
    let mut p = BytesMut::new();
    p.put_u32_le(protocol_version);
    p.put_u32_le(username.len() as u32);
    p.extend_from_slice(username.as_bytes());
    p.put_u32_le(password.len() as u32);
    p.extend_from_slice(password.as_bytes());
    frame(0x01, &p)
}

async fn read_frame<R: AsyncReadExt + Unpin>(r: &mut R) -> std::io::Result<Vec<u8>> {
    let mut lenbuf = [0u8; 4];
    r.read_exact(&mut lenbuf).await?;
    let len = u32::from_be_bytes(lenbuf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;
    Ok(buf)
}

#[tokio::test]
async fn handshake_ok() {
    let addr = start_server(|_| {}).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    stream
        .write_all(&encode_hello(1, "guest", ""))
        .await
        .unwrap();
    stream.flush().await.unwrap();

    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x02, "expected MSG_HELLO_OK");
    assert_eq!(response.len(), 5, "expected 4-byte features payload");
}

#[tokio::test]
async fn handshake_advertises_remove_feature() {
    let addr = start_server(|c| c.server.allow_remove = true).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    stream
        .write_all(&encode_hello(1, "guest", ""))
        .await
        .unwrap();

    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x02);
    let features = u32::from_le_bytes(response[1..5].try_into().unwrap());
    assert_ne!(features & 0x02, 0, "FEATURE_REMOVE not advertised");
}

#[tokio::test]
async fn handshake_rejects_unknown_user() {
    let addr = start_server(|_| {}).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    stream
        .write_all(&encode_hello(1, "root", "hunter2"))
        .await
        .unwrap();

    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x03, "expected MSG_FAIL");
}

#[tokio::test]
async fn handshake_rejects_bad_version() {
    let addr = start_server(|_| {}).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    stream
        .write_all(&encode_hello(99, "guest", ""))
        .await
        .unwrap();

    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x03, "expected MSG_FAIL");
}

#[tokio::test]
async fn rejects_command_before_hello() {
    let addr = start_server(|_| {}).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    // LIST without a handshake
    stream.write_all(&frame(0x18, &[])).await.unwrap();

    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x03, "expected MSG_FAIL");
}

#[tokio::test]
async fn unknown_command_fails_without_closing() {
    let addr = start_server(|_| {}).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    stream
        .write_all(&encode_hello(1, "guest", ""))
        .await
        .unwrap();
    let _ = read_frame(&mut stream).await.unwrap();

    stream.write_all(&frame(0x7f, &[])).await.unwrap();
    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x03, "expected MSG_FAIL");

    // Connection must still be usable: LIST now succeeds
    stream.write_all(&frame(0x18, &[])).await.unwrap();
    let response = read_frame(&mut stream).await.unwrap();
    assert_eq!(response[0], 0x19, "expected MSG_LIST_OK");
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let addr = start_server(|c| c.limits.max_hello_frame_bytes = 64).await;
    let mut stream = TcpStream::connect(&addr).await.unwrap();

    // Claim a frame far beyond the hello cap; the server must drop us
    // without reading the body.
    let mut buf = BytesMut::new();
    buf.put_u32(1024 * 1024);
    buf.put_u8(0x01);
    stream.write_all(&buf).await.unwrap();

    // Either a clean close or an error is fine; a response frame is not.
    let mut probe = [0u8; 1];
    match tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(&mut probe)).await {
        Ok(Ok(0)) => {}
        Ok(Ok(_)) => panic!("server responded to an oversized frame"),
        Ok(Err(_)) => {}
        Err(_) => panic!("server hung on oversized frame"),
    }
}
