//! Child-side exchange loop.
//!
//! The runner binary is the child end of the exchange: it reads framed
//! messages from stdin, applies a registered function to each chunk and
//! writes the result back to stdout. The loop is written over plain `Read`
//! and `Write` so it can be driven from in-memory pipes in tests.

use std::io::{BufRead, BufReader, Read, Write};

use crate::common::error::StreamError;
use crate::protocol::FunctionSpec;

use super::feather::{decode_ipc, encode_ipc, unwrap_payload};
use super::functions;
use super::settings::Format;

const MAX_MESSAGE_BYTES: usize = 256 * 1024 * 1024;
const MAX_BLOCK_LINES: usize = 16 * 1024 * 1024;

/// Runner configuration, usually assembled from the command line.
pub struct RunnerConfig {
    pub format: Format,
    /// Function applied to every chunk; identity when absent.
    pub func: Option<FunctionSpec>,
    /// Take the function from the first (payload) message instead of the
    /// command line. Feather mode only.
    pub read_spec: bool,
}

/// Run the exchange loop until the terminator arrives.
pub fn run<R: Read, W: Write>(cfg: &RunnerConfig, input: R, output: W) -> Result<(), StreamError> {
    match cfg.format {
        Format::Feather => run_feather(cfg, input, output),
        Format::Tsv => {
            if cfg.read_spec {
                return Err(StreamError::BadArgs(
                    "--read-spec requires feather format".into(),
                ));
            }
            run_tsv(cfg, input, output)
        }
    }
}

fn read_message<R: Read>(r: &mut R) -> Result<Vec<u8>, StreamError> {
    let mut size_buf = [0u8; 8];
    r.read_exact(&mut size_buf)?;
    let size = u64::from_le_bytes(size_buf) as usize;
    if size > MAX_MESSAGE_BYTES {
        return Err(StreamError::Protocol("message exceeds size cap"));
    }
    let mut buf = vec![0u8; size];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_message<W: Write>(w: &mut W, bytes: &[u8]) -> Result<(), StreamError> {
    w.write_all(&(bytes.len() as u64).to_le_bytes())?;
    w.write_all(bytes)?;
    w.flush()?;
    Ok(())
}

fn run_feather<R: Read, W: Write>(
    cfg: &RunnerConfig,
    mut input: R,
    mut output: W,
) -> Result<(), StreamError> {
    let mut func = cfg.func.clone();
    let mut awaiting_spec = cfg.read_spec;

    loop {
        let msg = read_message(&mut input)?;
        if msg.is_empty() {
            write_message(&mut output, &[])?;
            return Ok(());
        }

        let batches = decode_ipc(&msg)?;

        if awaiting_spec {
            awaiting_spec = false;
            let first = batches
                .first()
                .ok_or(StreamError::Protocol("empty payload message"))?;
            let raw = unwrap_payload(first)?;
            func = Some(
                FunctionSpec::decode(&raw)
                    .map_err(|_| StreamError::Protocol("bad packed function payload"))?,
            );
            // The payload broadcast gets no response.
            continue;
        }

        let out = match &func {
            Some(spec) => functions::apply(spec, batches)?,
            None => batches,
        };
        if out.is_empty() {
            // An empty message means terminator, so a function that drops
            // every chunk cannot be represented. Registry functions keep at
            // least one zero-row chunk.
            return Err(StreamError::Protocol("function produced no chunks"));
        }
        write_message(&mut output, &encode_ipc(&out)?)?;
    }
}

fn run_tsv<R: Read, W: Write>(
    cfg: &RunnerConfig,
    input: R,
    mut output: W,
) -> Result<(), StreamError> {
    let mut reader = BufReader::new(input);

    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(StreamError::Protocol("input closed before terminator"));
        }
        let count: usize = header
            .trim()
            .parse()
            .map_err(|_| StreamError::Protocol("bad block header"))?;
        if count > MAX_BLOCK_LINES {
            return Err(StreamError::Protocol("block exceeds line cap"));
        }
        if count == 0 {
            output.write_all(b"0\n")?;
            output.flush()?;
            return Ok(());
        }

        let mut lines = Vec::with_capacity(count);
        for _ in 0..count {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Err(StreamError::Protocol("input closed mid block"));
            }
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }

        let out = match &cfg.func {
            Some(spec) => functions::apply_lines(spec, lines)?,
            None => lines,
        };

        let mut buf = format!("{}\n", out.len());
        for line in &out {
            buf.push_str(line);
            buf.push('\n');
        }
        output.write_all(buf.as_bytes())?;
        output.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::feather::wrap_payload;
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::io::Cursor;
    use std::sync::Arc;

    fn chunk(values: &[f64]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)]));
        RecordBatch::try_new(
            schema,
            vec![Arc::new(Float64Array::from(values.to_vec()))],
        )
        .unwrap()
    }

    fn push_message(buf: &mut Vec<u8>, bytes: &[u8]) {
        buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        buf.extend_from_slice(bytes);
    }

    fn pop_message(buf: &mut &[u8]) -> Vec<u8> {
        let size = u64::from_le_bytes(buf[..8].try_into().unwrap()) as usize;
        let msg = buf[8..8 + size].to_vec();
        *buf = &buf[8 + size..];
        msg
    }

    #[test]
    fn feather_identity_roundtrip() {
        let mut input = Vec::new();
        push_message(&mut input, &encode_ipc(&[chunk(&[1.0, 2.0])]).unwrap());
        push_message(&mut input, &[]);

        let cfg = RunnerConfig {
            format: Format::Feather,
            func: None,
            read_spec: false,
        };
        let mut output = Vec::new();
        run(&cfg, Cursor::new(input), &mut output).unwrap();

        let mut rest = output.as_slice();
        let resp = pop_message(&mut rest);
        let batches = decode_ipc(&resp).unwrap();
        assert_eq!(batches, vec![chunk(&[1.0, 2.0])]);
        assert!(pop_message(&mut rest).is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn feather_spec_from_payload() {
        let spec = FunctionSpec::new("head", &["1"]);
        let payload = wrap_payload(&spec.encode()).unwrap();

        let mut input = Vec::new();
        push_message(&mut input, &encode_ipc(&[payload]).unwrap());
        push_message(&mut input, &encode_ipc(&[chunk(&[1.0, 2.0, 3.0])]).unwrap());
        push_message(&mut input, &[]);

        let cfg = RunnerConfig {
            format: Format::Feather,
            func: None,
            read_spec: true,
        };
        let mut output = Vec::new();
        run(&cfg, Cursor::new(input), &mut output).unwrap();

        let mut rest = output.as_slice();
        let batches = decode_ipc(&pop_message(&mut rest)).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 1);
    }

    #[test]
    fn tsv_head_roundtrip() {
        let input = b"3\na\nb\nc\n0\n".to_vec();
        let cfg = RunnerConfig {
            format: Format::Tsv,
            func: Some(FunctionSpec::new("head", &["2"])),
            read_spec: false,
        };
        let mut output = Vec::new();
        run(&cfg, Cursor::new(input), &mut output).unwrap();
        assert_eq!(output, b"2\na\nb\n0\n");
    }

    #[test]
    fn tsv_rejects_read_spec() {
        let cfg = RunnerConfig {
            format: Format::Tsv,
            func: None,
            read_spec: true,
        };
        let mut output = Vec::new();
        assert!(run(&cfg, Cursor::new(b"0\n".to_vec()), &mut output).is_err());
    }
}
