// ===============================
// src/dashboard.rs
// ===============================
//
// Presentation layer:
// - load_snapshot  : tiga read (status, balance, open orders) dijalankan paralel
// - SnapshotCache  : TTL cache di luar client (client tetap stateless)
// - render_html    : halaman dashboard (metric cards + tabel)
//
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::Mutex, time::Instant};
use tracing::info;

use crate::client::ApiClient;
use crate::domain::{assets_held, Balances, ExchangeStatus, OrderQueryResult};
use crate::metrics::{ACTIVE_PAIRS, API_ONLINE, ASSETS_HELD, CACHE_HITS, REFRESHES};

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub status: Option<ExchangeStatus>,
    pub balances: Option<Balances>,
    pub orders: OrderQueryResult,
}

impl Snapshot {
    pub fn api_online(&self) -> bool {
        self.status.as_ref().map(|s| s.is_running).unwrap_or(false)
    }

    pub fn assets_held(&self) -> usize {
        self.balances.as_ref().map(assets_held).unwrap_or(0)
    }

    pub fn active_trading_pairs(&self) -> usize {
        self.orders.distinct_pairs()
    }

    fn publish_metrics(&self) {
        API_ONLINE.set(self.api_online() as i64);
        ASSETS_HELD.set(self.assets_held() as i64);
        ACTIVE_PAIRS.set(self.active_trading_pairs() as i64);
    }
}

/// Fetch everything the page shows. Each read degrades on its own.
pub async fn load_snapshot(client: &ApiClient) -> Snapshot {
    let (status, balances, orders) = tokio::join!(
        client.get_exchange_status(),
        client.get_balance(),
        client.query_orders(None, true),
    );
    let snap = Snapshot {
        fetched_at: Utc::now(),
        status,
        balances,
        orders,
    };
    snap.publish_metrics();
    info!(
        online = snap.api_online(),
        assets_held = snap.assets_held(),
        active_pairs = snap.active_trading_pairs(),
        "snapshot refreshed"
    );
    snap
}

pub struct SnapshotCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<Snapshot>)>>,
    // in-flight guard: satu refresh pada satu waktu, slot tetap bebas dikunci
    refreshing: Mutex<()>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        SnapshotCache {
            ttl,
            slot: Mutex::new(None),
            refreshing: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fresh(&self) -> Option<Arc<Snapshot>> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, snap)| snap.clone())
    }

    /// Cached snapshot while fresh, otherwise `fetch()`. Concurrent page
    /// loads wait on one in-flight refresh; the slot itself is never locked
    /// across the fetch, so `invalidate()` does not wait on the network.
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> Arc<Snapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Snapshot>,
    {
        if let Some(snap) = self.fresh().await {
            CACHE_HITS.inc();
            return snap;
        }

        let _inflight = self.refreshing.lock().await;
        // refresh lain mungkin sudah selesai selama kita menunggu
        if let Some(snap) = self.fresh().await {
            CACHE_HITS.inc();
            return snap;
        }

        let snap = Arc::new(fetch().await);
        REFRESHES.inc();
        *self.slot.lock().await = Some((Instant::now(), snap.clone()));
        snap
    }

    /// "Refresh Data": the next read goes to the API.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

// ---- HTML ----

fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn metric_card(label: &str, value: &str, help: &str) -> String {
    format!(
        r#"<div class="card" title="{}"><div class="label">{}</div><div class="value">{}</div></div>"#,
        esc(help),
        esc(label),
        esc(value)
    )
}

pub fn render_html(snap: &Snapshot, refresh_secs: u64) -> String {
    let status = if snap.api_online() {
        "🟢 Online"
    } else {
        "🔴 Offline"
    };

    let mut html = String::new();
    html.push_str(&format!(
        r#"<!doctype html>
<html><head><meta charset="utf-8"><meta http-equiv="refresh" content="{refresh_secs}">
<title>Roostoo Dashboard</title>
<style>
body{{font-family:sans-serif;margin:2rem}} .cards{{display:flex;gap:1rem}}
.card{{border:1px solid #ddd;border-radius:8px;padding:1rem;min-width:12rem}}
.label{{color:#666}} .value{{font-size:1.6rem}} table{{border-collapse:collapse}}
td,th{{border:1px solid #ddd;padding:.3rem .6rem;text-align:right}} .info{{color:#555}} .error{{color:#b00}}
</style></head><body>
<h1>📈 Roostoo Trading Dashboard</h1>
<form method="post" action="/refresh"><button type="submit">Refresh Data</button></form>
<p class="info">Last updated {}</p>
<h2>Key Metrics</h2><div class="cards">"#,
        snap.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str(&metric_card("API Status", status, "Exchange reports IsRunning"));
    html.push_str(&metric_card(
        "Assets Held",
        &snap.assets_held().to_string(),
        "Number of assets with a non-zero balance.",
    ));
    html.push_str(&metric_card(
        "Active Trading Pairs",
        &snap.active_trading_pairs().to_string(),
        "Number of unique pairs with open orders.",
    ));
    html.push_str("</div><hr>");

    html.push_str("<h2>💰 Account Balance</h2>");
    match &snap.balances {
        Some(b) if !b.is_empty() => {
            html.push_str("<table><tr><th>Asset</th><th>Free</th><th>Locked</th></tr>");
            for (asset, bal) in b {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    esc(asset),
                    bal.free,
                    bal.locked
                ));
            }
            html.push_str("</table>");
        }
        _ => html.push_str(r#"<p class="info">No assets with a balance found.</p>"#),
    }

    html.push_str("<h2>📊 Open Orders</h2>");
    let orders = &snap.orders;
    if !orders.orders.is_empty() {
        html.push_str(
            "<table><tr><th>ID</th><th>Pair</th><th>Side</th><th>Type</th><th>Status</th>\
             <th>Price</th><th>Quantity</th><th>Filled</th></tr>",
        );
        for o in &orders.orders {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                o.order_id,
                esc(&o.pair),
                o.side.as_str(),
                esc(&o.order_type),
                esc(o.status.label()),
                o.price,
                o.quantity,
                o.filled_quantity
            ));
        }
        html.push_str("</table>");
    } else if !orders.success {
        html.push_str(&format!(
            r#"<p class="error">Error loading orders: {}</p>"#,
            esc(orders.error_message.as_deref().unwrap_or("unknown error"))
        ));
    } else {
        html.push_str(r#"<p class="info">No open orders found.</p>"#);
    }

    html.push_str("</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetBalance, OrderRecord, OrderStatus, Side};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pending(id: u64, pair: &str) -> OrderRecord {
        OrderRecord {
            order_id: id,
            pair: pair.to_string(),
            side: Side::Buy,
            order_type: "LIMIT".into(),
            status: OrderStatus::Pending,
            price: dec!(100),
            quantity: dec!(1),
            filled_quantity: dec!(0),
            filled_avg_price: dec!(0),
            created_ms: 0,
            finished_ms: 0,
        }
    }

    fn snapshot() -> Snapshot {
        let mut balances = Balances::new();
        balances.insert("BTC".into(), AssetBalance { free: dec!(1), locked: dec!(0) });
        balances.insert("DOGE".into(), AssetBalance { free: dec!(0), locked: dec!(0) });
        Snapshot {
            fetched_at: Utc::now(),
            status: Some(ExchangeStatus {
                is_running: true,
                initial_wallet: BTreeMap::new(),
                trade_pairs: BTreeMap::new(),
            }),
            balances: Some(balances),
            orders: OrderQueryResult {
                success: true,
                orders: vec![pending(1, "BTC/USD"), pending(2, "ETH/USD"), pending(3, "BTC/USD")],
                error_message: None,
            },
        }
    }

    fn offline() -> Snapshot {
        Snapshot {
            fetched_at: Utc::now(),
            status: None,
            balances: None,
            orders: OrderQueryResult::failure("connectivity: refused"),
        }
    }

    #[test]
    fn derived_metrics() {
        let s = snapshot();
        assert!(s.api_online());
        assert_eq!(s.assets_held(), 1);
        assert_eq!(s.active_trading_pairs(), 2);

        let o = offline();
        assert!(!o.api_online());
        assert_eq!(o.assets_held(), 0);
        assert_eq!(o.active_trading_pairs(), 0);
    }

    #[test]
    fn html_shows_tables() {
        let page = render_html(&snapshot(), 60);
        assert!(page.contains("Online"));
        assert!(page.contains("content=\"60\""));
        assert!(page.contains("<td>BTC</td>"));
        assert!(page.contains("ETH/USD"));
    }

    #[test]
    fn html_degrades_when_offline() {
        let page = render_html(&offline(), 30);
        assert!(page.contains("Offline"));
        assert!(page.contains("No assets with a balance found."));
        assert!(page.contains("Error loading orders: connectivity: refused"));
    }

    #[test]
    fn html_empty_orders() {
        let mut s = snapshot();
        s.orders.orders.clear();
        assert!(render_html(&s, 60).contains("No open orders found."));
    }

    #[test]
    fn html_escapes_server_text() {
        let mut s = offline();
        s.orders = OrderQueryResult::failure("<script>x</script>");
        let page = render_html(&s, 60);
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn cache_serves_until_invalidated() {
        let cache = SnapshotCache::new(Duration::from_secs(3600));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            offline()
        };

        cache.get_or_refresh(fetch).await;
        cache.get_or_refresh(fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        cache.get_or_refresh(fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_does_not_wait_for_a_stalled_fetch() {
        let cache = Arc::new(SnapshotCache::new(Duration::from_secs(3600)));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .get_or_refresh(move || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        offline()
                    })
                    .await
            }
        });

        started_rx.await.unwrap();
        let done = tokio::time::timeout(Duration::from_secs(1), cache.invalidate()).await;
        assert!(done.is_ok(), "invalidate blocked behind the in-flight fetch");

        release_tx.send(()).unwrap();
        pending.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_refresh() {
        let cache = Arc::new(SnapshotCache::new(Duration::from_secs(3600)));
        let counter = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_refresh(move || async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            offline()
                        })
                        .await
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_refreshes() {
        let cache = SnapshotCache::new(Duration::ZERO);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            offline()
        };
        cache.get_or_refresh(fetch).await;
        cache.get_or_refresh(fetch).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn load_snapshot_degrades_offline() {
        let cfg = crate::config::Config::from_lookup(|k| match k {
            "API_KEY" => Some("k".into()),
            "API_SECRET" => Some("s".into()),
            "BASE_URL" => Some("http://127.0.0.1:1".into()),
            _ => None,
        })
        .unwrap();
        let snap = load_snapshot(&ApiClient::new(&cfg)).await;
        assert!(!snap.api_online());
        assert!(snap.balances.is_none());
        assert!(!snap.orders.success);
    }
}
