// ===============================
// src/main.rs
// ===============================
/*
 cd /home/kukuhtw/rust/roostoo_dashboard

 # dashboard di browser
 cargo run --release -- --port 8501 --cache-ttl-secs 60
 open http://127.0.0.1:8501/

 # satu snapshot saja (JSON ke stdout)
 cargo run --release -- --once

 # metrics
 curl -s localhost:8501/metrics | grep '^dashboard_'
*/
/*
=============================================================================
Project : roostoo_dashboard — account dashboard for the Roostoo exchange
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Signs and sends read-only Roostoo REST calls (server time,
          exchange info, balance, order query), serves a small browser
          dashboard with TTL-cached snapshots, and exposes Prometheus metrics.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
mod client;     // signed REST client + time sync
mod config;
mod dashboard;
mod domain;
mod metrics;
mod roostoo;    // signer + wire models
mod server;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::client::ApiClient;
use crate::dashboard::SnapshotCache;
use crate::server::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = config::Cli::parse();

    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Config (fatal kalau tidak lengkap, sebelum ada network call) ----
    let cfg = match config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "configuration error, check API_KEY / API_SECRET / BASE_URL in .env");
            return ExitCode::from(2);
        }
    };

    info!(
        base_url = %cfg.base_url,
        bind = %cli.bind,
        port = cli.port,
        cache_ttl_secs = cli.cache_ttl_secs,
        once = cli.once,
        "startup config"
    );

    metrics::init();
    let client = ApiClient::new(&cfg);

    if cli.once {
        let snap = dashboard::load_snapshot(&client).await;
        return match serde_json::to_string_pretty(&snap) {
            Ok(s) => {
                println!("{s}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(?e, "snapshot serialize failed");
                ExitCode::FAILURE
            }
        };
    }

    let state = Arc::new(AppState {
        client,
        cache: SnapshotCache::new(Duration::from_secs(cli.cache_ttl_secs)),
    });
    let addr = SocketAddr::new(cli.bind, cli.port);

    match server::serve(addr, state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, %addr, "dashboard server failed");
            ExitCode::FAILURE
        }
    }
}
