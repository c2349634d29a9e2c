//! Client for the binary RPC protocol.
//!
//! Used by the bundled command line tools and by integration tests. The
//! client speaks the same framed protocol the server serves: 4-byte
//! big-endian length, 1-byte message type, payload.

use std::io;

use arrow::array::{BinaryArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::{BufMut, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::protocol::codec::{frame, get_bytes_max, get_str, put_bytes, put_str};
use crate::protocol::rpc::{
    decode_fail, decode_list_ok, write_all, ListEntry, MSG_FAIL, MSG_FETCH, MSG_FETCH_OK,
    MSG_HELLO, MSG_HELLO_OK, MSG_LIST, MSG_LIST_OK, MSG_QUERY, MSG_QUERY_OK, MSG_REMOVE,
    MSG_REMOVE_OK, MSG_UPLOAD, MSG_UPLOAD_OK,
};
use crate::protocol::FunctionSpec;
use crate::stream::feather::decode_ipc;

const CLIENT_PROTOCOL_VERSION: u32 = 1;
const MAX_RESPONSE_BYTES: usize = 256 * 1024 * 1024;

/// Pack a registry function and its arguments for upload.
pub fn pack_func(name: &str, args: &[&str]) -> Vec<u8> {
    FunctionSpec::new(name, args).encode()
}

/// One scalar value out of a result array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    Int64(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Double(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// One row of a result array, with its position.
#[derive(Debug, Clone)]
pub struct Row {
    pub chunk: usize,
    pub index: usize,
    pub values: Vec<Value>,
}

/// A query or fetch result: the chunks the server returned.
#[derive(Debug)]
pub struct ResultArray {
    batches: Vec<RecordBatch>,
}

impl ResultArray {
    fn from_ipc(bytes: &[u8]) -> io::Result<Self> {
        let batches = decode_ipc(bytes).map_err(io::Error::from)?;
        Ok(Self { batches })
    }

    pub fn num_chunks(&self) -> usize {
        self.batches.len()
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Flatten into positioned rows.
    pub fn rows(&self) -> io::Result<Vec<Row>> {
        let mut out = Vec::with_capacity(self.num_rows());
        for (chunk, batch) in self.batches.iter().enumerate() {
            for index in 0..batch.num_rows() {
                let mut values = Vec::with_capacity(batch.num_columns());
                for col in batch.columns() {
                    let v = match col.data_type() {
                        DataType::Float64 => Value::Double(
                            col.as_any()
                                .downcast_ref::<Float64Array>()
                                .unwrap()
                                .value(index),
                        ),
                        DataType::Int64 => Value::Int64(
                            col.as_any()
                                .downcast_ref::<Int64Array>()
                                .unwrap()
                                .value(index),
                        ),
                        DataType::Utf8 => Value::Str(
                            col.as_any()
                                .downcast_ref::<StringArray>()
                                .unwrap()
                                .value(index)
                                .to_string(),
                        ),
                        DataType::Binary => Value::Bytes(
                            col.as_any()
                                .downcast_ref::<BinaryArray>()
                                .unwrap()
                                .value(index)
                                .to_vec(),
                        ),
                        other => {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                format!("unsupported result column type {other}"),
                            ))
                        }
                    };
                    values.push(v);
                }
                out.push(Row {
                    chunk,
                    index,
                    values,
                });
            }
        }
        Ok(out)
    }
}

/// A connected client.
pub struct Client {
    stream: TcpStream,
    features: u32,
}

fn fail_to_error(payload: &[u8]) -> io::Error {
    match decode_fail(payload) {
        Ok((code, msg)) => io::Error::new(
            io::ErrorKind::Other,
            format!("server error {code}: {msg}"),
        ),
        Err(_) => io::Error::new(io::ErrorKind::InvalidData, "malformed fail response"),
    }
}

impl Client {
    /// Connect and perform the handshake as `guest`.
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let mut client = Self {
            stream,
            features: 0,
        };

        let mut p = BytesMut::new();
        p.put_u32_le(CLIENT_PROTOCOL_VERSION);
        put_str(&mut p, "guest");
        put_str(&mut p, "");

        let (typ, payload) = client.request(MSG_HELLO, &p).await?;
        match typ {
            MSG_HELLO_OK => {
                let mut q = payload.as_slice();
                client.features = crate::protocol::codec::get_u32_le(&mut q)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                Ok(client)
            }
            MSG_FAIL => Err(fail_to_error(&payload)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected hello response",
            )),
        }
    }

    /// Feature bits the server advertised.
    pub fn features(&self) -> u32 {
        self.features
    }

    async fn request(&mut self, msg_type: u8, payload: &[u8]) -> io::Result<(u8, Vec<u8>)> {
        write_all(&mut self.stream, &frame(msg_type, payload)).await?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> io::Result<(u8, Vec<u8>)> {
        let len = self.stream.read_u32().await? as usize;
        if len == 0 || len > MAX_RESPONSE_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bad response length",
            ));
        }
        let typ = self.stream.read_u8().await?;
        let mut payload = vec![0u8; len - 1];
        self.stream.read_exact(&mut payload).await?;
        Ok((typ, payload))
    }

    /// Upload bytes as a stored array. An empty name asks the server to
    /// assign one; the assigned name is returned.
    pub async fn upload(&mut self, name: &str, data: &[u8]) -> io::Result<String> {
        let mut p = BytesMut::with_capacity(8 + name.len() + data.len());
        put_str(&mut p, name);
        put_bytes(&mut p, data);

        let (typ, payload) = self.request(MSG_UPLOAD, &p).await?;
        match typ {
            MSG_UPLOAD_OK => {
                let mut q = payload.as_slice();
                get_str(&mut q)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
            }
            MSG_FAIL => Err(fail_to_error(&payload)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected upload response",
            )),
        }
    }

    /// Run a stream query: pipe `expr` through `command` with the given
    /// options, optionally broadcasting a stored payload array first.
    pub async fn stream(
        &mut self,
        expr: &str,
        command: &str,
        options: &[&str],
        payload_name: &str,
    ) -> io::Result<ResultArray> {
        let mut p = BytesMut::new();
        put_str(&mut p, expr);
        put_str(&mut p, command);
        p.put_u32_le(options.len() as u32);
        for opt in options {
            put_str(&mut p, opt);
        }
        put_str(&mut p, payload_name);

        let (typ, payload) = self.request(MSG_QUERY, &p).await?;
        match typ {
            MSG_QUERY_OK => {
                let mut q = payload.as_slice();
                let ipc = get_bytes_max(&mut q, MAX_RESPONSE_BYTES)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                ResultArray::from_ipc(&ipc)
            }
            MSG_FAIL => Err(fail_to_error(&payload)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected query response",
            )),
        }
    }

    /// Fetch a stored array.
    pub async fn fetch(&mut self, name: &str) -> io::Result<ResultArray> {
        let mut p = BytesMut::new();
        put_str(&mut p, name);

        let (typ, payload) = self.request(MSG_FETCH, &p).await?;
        match typ {
            MSG_FETCH_OK => {
                let mut q = payload.as_slice();
                let ipc = get_bytes_max(&mut q, MAX_RESPONSE_BYTES)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                ResultArray::from_ipc(&ipc)
            }
            MSG_FAIL => Err(fail_to_error(&payload)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected fetch response",
            )),
        }
    }

    /// Remove a stored array.
    pub async fn remove(&mut self, name: &str) -> io::Result<()> {
        let mut p = BytesMut::new();
        put_str(&mut p, name);

        let (typ, payload) = self.request(MSG_REMOVE, &p).await?;
        match typ {
            MSG_REMOVE_OK => Ok(()),
            MSG_FAIL => Err(fail_to_error(&payload)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected remove response",
            )),
        }
    }

    /// List the server catalog.
    pub async fn list(&mut self) -> io::Result<Vec<ListEntry>> {
        let (typ, payload) = self.request(MSG_LIST, &[]).await?;
        match typ {
            MSG_LIST_OK => decode_list_ok(&payload)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
            MSG_FAIL => Err(fail_to_error(&payload)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unexpected list response",
            )),
        }
    }
}
