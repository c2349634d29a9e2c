//! Child process exchange.
//!
//! The server spawns the query command under a shell with piped stdin and
//! stdout, then drives a strict request and response exchange over those
//! pipes. Feather mode frames each message as a little-endian u64 byte size
//! followed by an Arrow IPC stream; a zero size ends the exchange from
//! either side. TSV mode frames each block as a line count followed by that
//! many lines, with a zero count as the terminator.

use std::process::Stdio;

use arrow::record_batch::RecordBatch;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::feather::{apply_names, check_response_schema, encode_ipc, decode_ipc};
use super::settings::StreamSettings;
use super::tsv::{batch_to_lines, lines_to_batch};
use crate::common::error::StreamError;

/// A spawned child with framed pipes.
pub struct ChildProc {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ChildProc {
    /// Spawn `shell -c command` with piped stdin and stdout. Stderr passes
    /// through to the server's own stderr.
    pub fn spawn(shell: &str, command: &str) -> Result<Self, StreamError> {
        let mut child = Command::new(shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(StreamError::Spawn)?;

        let stdin = child.stdin.take().ok_or(StreamError::Protocol("no child stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(StreamError::Protocol("no child stdout"))?;

        debug!("spawned child: {shell} -c {command:?}");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn write_message(&mut self, bytes: &[u8]) -> Result<(), StreamError> {
        self.stdin.write_u64_le(bytes.len() as u64).await?;
        self.stdin.write_all(bytes).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Read one framed message. A zero size yields an empty vec.
    async fn read_message(&mut self, max_bytes: usize) -> Result<Vec<u8>, StreamError> {
        let size = match self.stdout.read_u64_le().await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(StreamError::ChildExited)
            }
            Err(e) => return Err(e.into()),
        };
        if size as usize > max_bytes {
            return Err(StreamError::Protocol("child message exceeds size cap"));
        }
        let mut buf = vec![0u8; size as usize];
        self.stdout.read_exact(&mut buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StreamError::ChildExited
            } else {
                e.into()
            }
        })?;
        Ok(buf)
    }

    async fn write_block(&mut self, lines: &[String]) -> Result<(), StreamError> {
        let mut buf = format!("{}\n", lines.len());
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }
        self.stdin.write_all(buf.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_block(&mut self, max_lines: usize) -> Result<Vec<String>, StreamError> {
        let mut header = String::new();
        if self.stdout.read_line(&mut header).await? == 0 {
            return Err(StreamError::ChildExited);
        }
        let count: usize = header
            .trim()
            .parse()
            .map_err(|_| StreamError::Protocol("bad block header from child"))?;
        if count > max_lines {
            return Err(StreamError::Protocol("child block exceeds line cap"));
        }

        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            let mut line = String::new();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(StreamError::ChildExited);
            }
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Wait for the child to exit after the exchange has finished.
    pub async fn finish(mut self) -> Result<(), StreamError> {
        drop(self.stdin);
        let status = self.child.wait().await?;
        if !status.success() {
            warn!("stream child exited with {status}");
        }
        Ok(())
    }
}

/// Drive a full feather exchange: optional payload broadcast, one response
/// per input chunk, terminating handshake.
pub async fn run_feather(
    child: &mut ChildProc,
    payload: Option<&[RecordBatch]>,
    input: &[RecordBatch],
    settings: &StreamSettings,
    max_message_bytes: usize,
) -> Result<Vec<RecordBatch>, StreamError> {
    if let Some(p) = payload {
        child.write_message(&encode_ipc(p)?).await?;
    }

    let mut out = Vec::new();
    for batch in input {
        // An empty message is the terminator, so 0-row chunks never go out.
        if batch.num_rows() == 0 {
            continue;
        }
        child
            .write_message(&encode_ipc(std::slice::from_ref(batch))?)
            .await?;
        let resp = child.read_message(max_message_bytes).await?;
        if resp.is_empty() {
            return Err(StreamError::Protocol("child ended exchange early"));
        }
        for rb in decode_ipc(&resp)? {
            check_response_schema(&rb, settings)?;
            out.push(apply_names(&rb, settings)?);
        }
    }

    child.write_message(&[]).await?;
    let fin = child.read_message(max_message_bytes).await?;
    if !fin.is_empty() {
        return Err(StreamError::Protocol("child sent data after terminator"));
    }

    Ok(out)
}

/// Drive a full TSV exchange: one response block per input chunk, zero-count
/// terminator both ways.
pub async fn run_tsv(
    child: &mut ChildProc,
    input: &[RecordBatch],
    max_lines: usize,
) -> Result<Vec<RecordBatch>, StreamError> {
    let mut out = Vec::new();
    for batch in input {
        if batch.num_rows() == 0 {
            continue;
        }
        let lines = batch_to_lines(batch)?;
        child.write_block(&lines).await?;
        let resp = child.read_block(max_lines).await?;
        out.push(lines_to_batch(&resp)?);
    }

    child.write_block(&[]).await?;
    let fin = child.read_block(max_lines).await?;
    if !fin.is_empty() {
        return Err(StreamError::Protocol("child sent data after terminator"));
    }

    Ok(out)
}
