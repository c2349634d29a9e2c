//! End-to-end stream query tests: in-process server, real runner child.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use strumok::client::{pack_func, Client, Value};
use strumok::config::Config;
use strumok::db::Database;
use strumok::net::serve_on;
use tokio::net::TcpListener;

static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

async fn start_server(mutate: impl FnOnce(&mut Config)) -> String {
    let seq = TEST_SEQ.fetch_add(1, Ordering::Relaxed);
    let data_dir = std::env::temp_dir().join(format!(
        "strumok-stream-test-{}-{}",
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

fn runner_cmd(args: &str) -> String {
    format!("'{}' {}", env!("CARGO_BIN_EXE_strumok-runner"), args)
}

#[tokio::test(flavor = "multi_thread")]
async fn first_row_through_packed_head() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let packed = pack_func("head", &["1"]);
    let payload_name = client.upload("", &packed).await.unwrap();
    assert!(payload_name.starts_with("up_"));

    let result = client
        .stream(
            "build(<x:double>[i=1:5], i)",
            &runner_cmd("--read-spec --format feather"),
            &["format=feather", "types=double"],
            &payload_name,
        )
        .await
        .unwrap();

    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].chunk, 0);
    assert_eq!(rows[0].index, 0);
    assert_eq!(rows[0].values, vec![Value::Double(1.0)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn scale_from_command_line() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let result = client
        .stream(
            "build(<x:double>[i=1:3], i)",
            &runner_cmd("--format feather --fn scale 2"),
            &["format=feather", "types=double", "names=scaled"],
            "",
        )
        .await
        .unwrap();

    let rows = result.rows().unwrap();
    let values: Vec<Value> = rows.into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(
        values,
        vec![Value::Double(2.0), Value::Double(4.0), Value::Double(6.0)]
    );
    assert_eq!(result.batches()[0].schema().field(0).name(), "scaled");
}

#[tokio::test(flavor = "multi_thread")]
async fn chunked_build_yields_one_response_per_chunk() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let result = client
        .stream(
            "build(<x:double>[i=0:9,4], i)",
            &runner_cmd("--format feather"),
            &["format=feather", "types=double"],
            "",
        )
        .await
        .unwrap();

    assert_eq!(result.num_chunks(), 3);
    assert_eq!(result.num_rows(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn tsv_exchange() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let result = client
        .stream(
            "build(<v:int64>[i=1:3], i * 10)",
            &runner_cmd("--format tsv"),
            &["format=tsv"],
            "",
        )
        .await
        .unwrap();

    let rows = result.rows().unwrap();
    let values: Vec<Value> = rows.into_iter().map(|r| r.values[0].clone()).collect();
    assert_eq!(
        values,
        vec![
            Value::Str("10".into()),
            Value::Str("20".into()),
            Value::Str("30".into())
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_input_chunks_are_skipped() {
    use arrow::array::Float64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use strumok::stream::child::run_feather;
    use strumok::stream::{ChildProc, StreamSettings};

    let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, false)]));
    let empty = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(Float64Array::from(Vec::<f64>::new()))],
    )
    .unwrap();
    let full = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(vec![1.0, 2.0]))],
    )
    .unwrap();

    let settings =
        StreamSettings::parse(&["format=feather".to_string(), "types=double".to_string()]).unwrap();
    let mut child = ChildProc::spawn("sh", &runner_cmd("--format feather")).unwrap();

    // One response per non-empty chunk; the empty chunks never reach the
    // child, which would otherwise treat them as the terminator.
    let input = [empty.clone(), full, empty];
    let out = run_feather(&mut child, None, &input, &settings, 1 << 20)
        .await
        .unwrap();
    child.finish().await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].num_rows(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_fetch_list_remove() {
    let addr = start_server(|c| c.server.allow_remove = true).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let data = b"opaque payload bytes".to_vec();
    let name = client.upload("my_payload", &data).await.unwrap();
    assert_eq!(name, "my_payload");

    let listed = client.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "my_payload");
    assert_eq!(listed[0].rows, 1);
    assert_eq!(listed[0].chunks, 1);

    let fetched = client.fetch("my_payload").await.unwrap();
    let rows = fetched.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![Value::Bytes(data)]);

    client.remove("my_payload").await.unwrap();
    assert!(client.list().await.unwrap().is_empty());
    assert!(client.remove("my_payload").await.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn remove_disabled_by_default() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    client.upload("keepme", b"x").await.unwrap();
    let err = client.remove("keepme").await.unwrap_err();
    assert!(err.to_string().contains("disabled"));
}

#[tokio::test(flavor = "multi_thread")]
async fn query_unknown_array_fails() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let err = client
        .stream(
            "no_such_array",
            &runner_cmd("--format feather"),
            &["format=feather"],
            "",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_expression_fails() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let err = client
        .stream(
            "build(<x:double>[i=5:1], i)",
            &runner_cmd("--format feather"),
            &["format=feather"],
            "",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("server error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn exiting_child_reports_failure() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    let err = client
        .stream(
            "build(<x:double>[i=1:5], i)",
            "exit 3",
            &["format=feather"],
            "",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("server error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn stored_array_as_stream_input() {
    let addr = start_server(|_| {}).await;
    let mut client = Client::connect(&addr).await.unwrap();

    // Stored arrays hold opaque payload bytes in a binary column; the
    // feather exchange carries them through the runner untouched.
    let name = client.upload("src_arr", b"abc").await.unwrap();

    let result = client
        .stream(
            &name,
            &runner_cmd("--format feather"),
            &["format=feather"],
            "",
        )
        .await
        .unwrap();

    let rows = result.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values, vec![Value::Bytes(b"abc".to_vec())]);
}
