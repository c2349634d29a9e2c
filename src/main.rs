use log::*;
use std::sync::Arc;

use strumok::api::http::serve_http;
use strumok::config::Config;
use strumok::db::Database;
use strumok::net::serve_rpc;

fn setup_logger() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", concat!(env!("CARGO_PKG_NAME"), "=debug"));
    }
    env_logger::init();
}

fn print_help() {
    println!("strumok v{}", env!("CARGO_PKG_VERSION"));
    println!("An array store that pipes stream queries through child processes\n");
    println!("USAGE:");
    println!("    strumok [OPTIONS] [CONFIG_FILE]\n");
    println!("OPTIONS:");
    println!("    -h, --help       Show this help message\n");
    println!("ARGUMENTS:");
    println!("    [CONFIG_FILE]    Path to configuration file (default: config.toml)\n");
    println!("CONFIGURATION:");
    println!("The configuration file uses a simple key=value format with sections.\n");
    println!("[limits] - Connection and resource limits");
    println!("  hello_timeout_ms = 3000                    # Timeout for initial handshake (ms)");
    println!("  command_timeout_ms = 15000                 # Timeout for commands (ms)");
    println!("  stream_timeout_ms = 60000                  # Timeout for a full child exchange (ms)");
    println!("  max_active_conns = 2048                    # Maximum concurrent connections");
    println!("  max_hello_frame_bytes = 1048576            # Max size of hello frame (1MB)");
    println!("  max_cmd_frame_bytes = 268435456            # Max size of command frame (256MB)");
    println!("  max_name_bytes = 256                       # Max length of array names");
    println!("  max_upload_bytes = 67108864                # Max uploaded payload size (64MB)");
    println!("  max_expr_bytes = 65536                     # Max query expression length");
    println!("  max_command_bytes = 16384                  # Max child command length");
    println!("  max_options = 16                           # Max stream options per query");
    println!("  max_option_bytes = 1024                    # Max length of one option");
    println!("  per_connection_inflight_bytes = 33554432   # Per-connection memory limit (32MB)");
    println!("  global_inflight_bytes = 536870912          # Global memory limit (512MB)\n");
    println!("[engine] - Storage engine configuration");
    println!("  data_dir = \"data\"                          # Data directory path\n");
    println!("[stream] - Child process stream execution");
    println!("  child_shell = \"sh\"                         # Shell used for child commands");
    println!("  chunk_rows = 1000000                       # Default chunk size in rows");
    println!("  max_build_cells = 100000000                # Max cells a build expression may span");
    println!("  max_child_message_bytes = 268435456        # Max message from a child (256MB)");
    println!("  max_child_lines = 16777216                 # Max lines per TSV block\n");
    println!("[server] - RPC server configuration");
    println!("  bind_addr = \"127.0.0.1:6464\"               # RPC server bind address");
    println!("  server_name = \"strumok\"                    # Server identifier");
    println!("  allow_remove = false                       # Allow REMOVE operations\n");
    println!("[http] - HTTP API server configuration");
    println!("  bind_addr = \"127.0.0.1:8080\"               # HTTP server bind address\n");
    println!("EXAMPLES:");
    println!("    strumok                                   # Use default config.toml");
    println!("    strumok myconfig.toml                     # Use custom config file");
    println!("    strumok --help                            # Show this help");
}

fn main() {
    let mut args = std::env::args().skip(1);

    let path = match args.next() {
        Some(arg) if arg == "-h" || arg == "--help" => {
            print_help();
            return;
        }
        Some(arg) => arg,
        None => "config.toml".to_string(),
    };

    setup_logger();
    let cfg = Config::load(&path).unwrap_or_else(|e| {
        eprintln!("failed to read config {}: {}", path, e);
        std::process::exit(1);
    });
    info!("config loaded from {}", path);

    run_server(Arc::new(cfg));
}

fn run_server(cfg: Arc<Config>) {
    let db = Arc::new(Database::open(&cfg).unwrap_or_else(|e| {
        eprintln!("failed to open storage: {e}");
        std::process::exit(1);
    }));

    // Small runtime for signal handling only
    let init_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build init runtime");

    // Separate runtime for the RPC server; stream exchanges and large IPC
    // responses need the parallelism
    let rpc_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(16)
        .thread_name("rpc-worker")
        .enable_all()
        .build()
        .expect("failed to build RPC runtime");

    // Separate runtime so HTTP stays responsive under RPC load
    let http_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("http-worker")
        .enable_all()
        .build()
        .expect("failed to build HTTP runtime");

    let _http_handle = {
        let cfg = cfg.clone();
        let db = db.clone();
        std::thread::spawn(move || {
            http_runtime.block_on(async move {
                serve_http(cfg, db).await;
            });
        })
    };

    let _rpc_handle = {
        let cfg = cfg.clone();
        let db = db.clone();
        std::thread::spawn(move || {
            rpc_runtime.block_on(async move {
                serve_rpc(cfg, db).await;
            });
        })
    };

    info!("strumok server started; press Ctrl-C to stop.");

    init_runtime.block_on(async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    });

    info!("shutting down...");
}
