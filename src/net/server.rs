//! TCP server for the binary RPC protocol.

use std::sync::Arc;

use log::*;
use tokio::net::TcpListener as TokioTcpListener;

use crate::api::metrics::METRICS;
use crate::config::Config;
use crate::db::Database;

use super::budget::Budget;
use super::handler::handle_client;

/// Bind the configured address and serve forever.
pub async fn serve_rpc(cfg: Arc<Config>, db: Arc<Database>) {
    let listener = TokioTcpListener::bind(&cfg.server.bind_addr)
        .await
        .expect("bind failed");
    serve_on(listener, cfg, db).await
}

/// Serve connections on an already-bound listener.
///
/// Split out from [`serve_rpc`] so tests can bind an ephemeral port first.
pub async fn serve_on(listener: TokioTcpListener, cfg: Arc<Config>, db: Arc<Database>) {
    let global_budget = Arc::new(Budget::new(cfg.limits.global_inflight_bytes));

    info!("rpc listening on {}", listener.local_addr().unwrap());

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!("accept: {}", e);
                continue;
            }
        };

        if METRICS.active_connections() >= cfg.limits.max_active_conns {
            debug!("refusing connection {}; too many", addr);
            drop(socket);
            continue;
        }
        METRICS.conn_opened();

        let cfg = cfg.clone();
        let db = db.clone();
        let global_budget = global_budget.clone();

        tokio::spawn(async move {
            debug!("new connection from {}", addr);

            match handle_client(socket, cfg, db, global_budget).await {
                Ok(()) => debug!("connection {} closed cleanly", addr),
                Err(e) => debug!("connection {} ended: {}", addr, e),
            }

            METRICS.conn_closed();
        });
    }
}
