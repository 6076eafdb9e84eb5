// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- REST client --------
pub static API_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("api_requests_total", "Roostoo REST calls (labels: endpoint, outcome)"),
        &["endpoint", "outcome"],
    )
    .unwrap()
});

pub static API_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("api_request_latency_seconds", "Roostoo REST round trip (s)"),
        &["endpoint"],
    )
    .unwrap()
});

// -------- Dashboard --------
pub static REFRESHES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("dashboard_refresh_total", "snapshots fetched from the API").unwrap());

pub static CACHE_HITS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("dashboard_cache_hits_total", "snapshots served from cache").unwrap());

pub static API_ONLINE: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("dashboard_api_online", "1 if exchange reports IsRunning").unwrap());

pub static ASSETS_HELD: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("dashboard_assets_held", "assets with non-zero balance").unwrap());

pub static ACTIVE_PAIRS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("dashboard_active_trading_pairs", "distinct pairs with open orders").unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(API_REQUESTS.clone())),
        REGISTRY.register(Box::new(API_LATENCY.clone())),
        REGISTRY.register(Box::new(REFRESHES.clone())),
        REGISTRY.register(Box::new(CACHE_HITS.clone())),
        REGISTRY.register(Box::new(API_ONLINE.clone())),
        REGISTRY.register(Box::new(ASSETS_HELD.clone())),
        REGISTRY.register(Box::new(ACTIVE_PAIRS.clone())),
    ] {
        // AlreadyReg kalau init() dipanggil dua kali (mis. di test)
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
