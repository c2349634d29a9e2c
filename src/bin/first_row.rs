//! End-to-end demo: upload a packed function, stream a built array through
//! the runner and print the first row of the result.
//!
//! With a running server on the default address this prints `(0,0,0,1.0)`:
//! attribute 0, chunk 0, position 0, value 1.0.

use strumok::client::{pack_func, Client, Value};

fn fmt_value(v: &Value) -> String {
    match v {
        // keep the trailing .0 on round doubles
        Value::Double(d) => format!("{d:?}"),
        other => other.to_string(),
    }
}

fn main() {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6464".to_string());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let result = runtime.block_on(async {
        let mut client = Client::connect(&addr).await?;

        // Pack head(1) and ship it to the server as a stored array.
        let packed = pack_func("head", &["1"]);
        let payload_name = client.upload("", &packed).await?;
        eprintln!("uploaded function as {payload_name}");

        // Pipe a built array through the runner, which picks the function
        // up from the payload broadcast.
        let result = client
            .stream(
                "build(<x:double>[i=1:5], i)",
                "strumok-runner --read-spec --format feather",
                &["format=feather", "types=double"],
                &payload_name,
            )
            .await?;

        for row in result.rows()? {
            for (attr, value) in row.values.iter().enumerate() {
                println!("({},{},{},{})", attr, row.chunk, row.index, fmt_value(value));
            }
        }
        Ok::<_, std::io::Error>(())
    });

    if let Err(e) = result {
        eprintln!("first-row: {e}");
        std::process::exit(1);
    }
}
