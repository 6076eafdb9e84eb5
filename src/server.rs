// ===============================
// src/server.rs
// ===============================
//
// HTTP server dashboard (hyper 0.14):
//   GET  /              -> halaman HTML
//   POST /refresh       -> invalidate cache, redirect ke /
//   GET  /api/snapshot  -> snapshot JSON
//   GET  /metrics       -> Prometheus text format
//
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::{
    header::{CONTENT_TYPE, LOCATION},
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use tracing::{debug, error, info};

use crate::client::ApiClient;
use crate::dashboard::{load_snapshot, render_html, Snapshot, SnapshotCache};
use crate::metrics;

pub struct AppState {
    pub client: ApiClient,
    pub cache: SnapshotCache,
}

impl AppState {
    async fn snapshot(&self) -> Arc<Snapshot> {
        self.cache.get_or_refresh(|| load_snapshot(&self.client)).await
    }
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    let mut rsp = Response::new(body.into());
    *rsp.status_mut() = status;
    if let Ok(v) = content_type.parse() {
        rsp.headers_mut().insert(CONTENT_TYPE, v);
    }
    rsp
}

pub async fn handle(req: Request<Body>, state: Arc<AppState>) -> Result<Response<Body>, Infallible> {
    debug!(method = %req.method(), path = req.uri().path(), "http request");

    let rsp = match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => {
            let snap = state.snapshot().await;
            let html = render_html(&snap, state.cache.ttl().as_secs().max(1));
            respond(StatusCode::OK, "text/html; charset=utf-8", html)
        }
        (&Method::POST, "/refresh") => {
            state.cache.invalidate().await;
            let mut rsp = respond(StatusCode::SEE_OTHER, "text/plain", Body::empty());
            rsp.headers_mut().insert(LOCATION, hyper::header::HeaderValue::from_static("/"));
            rsp
        }
        (&Method::GET, "/api/snapshot") => {
            let snap = state.snapshot().await;
            match serde_json::to_vec(snap.as_ref()) {
                Ok(json) => respond(StatusCode::OK, "application/json", json),
                Err(e) => {
                    error!(?e, "snapshot serialize failed");
                    respond(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "serialize error")
                }
            }
        }
        (&Method::GET, "/metrics") => respond(
            StatusCode::OK,
            &metrics::content_type(),
            metrics::encode_metrics(),
        ),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
    };
    Ok(rsp)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(?e, "ctrl_c handler failed");
    }
    info!("shutdown requested");
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone()))) }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!("dashboard listening on http://{addr}/ (and /metrics)");
    server.with_graceful_shutdown(shutdown_signal()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn state() -> Arc<AppState> {
        let cfg = Config::from_lookup(|k| match k {
            "API_KEY" => Some("k".into()),
            "API_SECRET" => Some("s".into()),
            "BASE_URL" => Some("http://127.0.0.1:1".into()),
            _ => None,
        })
        .unwrap();
        Arc::new(AppState {
            client: ApiClient::new(&cfg),
            cache: SnapshotCache::new(Duration::from_secs(60)),
        })
    }

    fn req(method: Method, path: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(rsp: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(rsp.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn index_renders_offline_page() {
        let rsp = handle(req(Method::GET, "/"), state()).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
        let text = body_text(rsp).await;
        assert!(text.contains("Offline"));
        assert!(text.contains("Error loading orders"));
    }

    #[tokio::test]
    async fn refresh_redirects_home() {
        let rsp = handle(req(Method::POST, "/refresh"), state()).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::SEE_OTHER);
        assert_eq!(rsp.headers()[LOCATION], "/");
    }

    #[tokio::test]
    async fn snapshot_json_has_uniform_failures() {
        let rsp = handle(req(Method::GET, "/api/snapshot"), state()).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body_text(rsp).await).unwrap();
        assert!(v["status"].is_null());
        assert!(v["balances"].is_null());
        assert_eq!(v["orders"]["success"], false);
    }

    #[tokio::test]
    async fn metrics_and_unknown_routes() {
        metrics::init();
        let rsp = handle(req(Method::GET, "/metrics"), state()).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::OK);

        let rsp = handle(req(Method::GET, "/nope"), state()).await.unwrap();
        assert_eq!(rsp.status(), StatusCode::NOT_FOUND);
    }
}
