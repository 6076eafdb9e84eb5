// ===============================
// src/client.rs
// ===============================
//
// Roostoo REST client (read-only):
// - get_server_timestamp : /v3/serverTime, dipanggil ulang untuk setiap call bertanda tangan
// - get_exchange_status  : /v3/exchangeInfo (tanpa auth)
// - get_balance          : /v3/balance (signed GET)
// - query_orders         : /v3/query_order (signed POST, endpoint asli Roostoo)
//
// `fetch_*` mengembalikan Result<_, ApiError>. Versi publik tanpa prefix
// mengubah error menjadi hasil seragam (None / success=false) supaya
// dashboard bisa menampilkan "offline" alih-alih crash. Satu percobaan
// per call, tanpa retry, timeout default dari reqwest.
//
use std::time::Instant;

use reqwest::{header::CONTENT_TYPE, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::{AssetBalance, Balances, ExchangeStatus, OrderQueryResult, OrderRecord};
use crate::metrics::{API_LATENCY, API_REQUESTS};
use crate::roostoo::{
    sign, BalanceResponse, Envelope, ExchangeInfoResponse, QueryOrderResponse,
    ServerTimeResponse, SignedParams, HEADER_API_KEY, HEADER_SIGNATURE,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("connectivity: {0}")]
    Connectivity(String),
    #[error("authentication rejected (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed {endpoint} response: {reason}")]
    Malformed { endpoint: &'static str, reason: String },
}

impl ApiError {
    fn outcome(&self) -> &'static str {
        match self {
            ApiError::Connectivity(_) => "connectivity",
            ApiError::Authentication { .. } => "auth",
            ApiError::Rejected { .. } => "rejected",
            ApiError::Malformed { .. } => "malformed",
        }
    }
}

/// Stateless signed client. Holds only the immutable credentials.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    api_key: String,
    api_secret: SecretString,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Self {
        Self::with_http(cfg, reqwest::Client::new())
    }

    pub fn with_http(cfg: &Config, http: reqwest::Client) -> Self {
        ApiClient {
            http,
            base: cfg.base(),
            api_key: cfg.credentials.api_key.clone(),
            api_secret: cfg.credentials.api_secret.clone(),
        }
    }

    // ---- Time sync ----

    /// Exchange clock in ms. Never falls back to the local clock.
    pub async fn get_server_timestamp(&self) -> Result<u64, ApiError> {
        let url = format!("{}/v3/serverTime", self.base);
        match self.call::<ServerTimeResponse>("server_time", self.http.get(url)).await {
            Ok(r) => Ok(r.server_time),
            Err(ApiError::Connectivity(m)) => Err(ApiError::Connectivity(m)),
            Err(e) => Err(ApiError::Connectivity(format!("server time unavailable: {e}"))),
        }
    }

    // ---- Exchange status ----

    pub async fn fetch_exchange_status(&self) -> Result<ExchangeStatus, ApiError> {
        let url = format!("{}/v3/exchangeInfo", self.base);
        let rsp: ExchangeInfoResponse = self.call("exchange_info", self.http.get(url)).await?;
        Ok(rsp.into())
    }

    pub async fn get_exchange_status(&self) -> Option<ExchangeStatus> {
        self.fetch_exchange_status().await.ok()
    }

    // ---- Balance ----

    pub async fn fetch_balance(&self) -> Result<Balances, ApiError> {
        let ts = self.get_server_timestamp().await?;
        let params = SignedParams::with_timestamp(ts);
        let (query, sig) = sign(self.api_secret.expose_secret(), &params);

        let url = format!("{}/v3/balance?{}", self.base, query);
        let req = self
            .http
            .get(url)
            .header(HEADER_API_KEY, &self.api_key)
            .header(HEADER_SIGNATURE, sig);

        let rsp: BalanceResponse = self.call("balance", req).await?;
        if let Some(message) = rsp.rejection() {
            return Err(ApiError::Authentication { status: 200, message });
        }

        Ok(rsp
            .spot_wallet
            .into_iter()
            .map(|(asset, w)| (asset, AssetBalance { free: w.free, locked: w.lock }))
            .collect())
    }

    /// `None` when the balance could not be fetched.
    pub async fn get_balance(&self) -> Option<Balances> {
        self.fetch_balance().await.ok()
    }

    // ---- Orders ----

    /// `POST /v3/query_order`, the exchange's real order query endpoint; the
    /// signed canonical string is sent as the form body.
    /// `pending_only` dikirim ke server dan juga ditegakkan di sisi client.
    pub async fn fetch_orders(
        &self,
        pair: Option<&str>,
        pending_only: bool,
    ) -> Result<OrderQueryResult, ApiError> {
        let ts = self.get_server_timestamp().await?;
        let mut params = SignedParams::with_timestamp(ts);
        if let Some(p) = pair.filter(|p| !p.is_empty()) {
            params.insert("pair", p);
        }
        params.insert("pending_only", if pending_only { "TRUE" } else { "FALSE" });
        let (body, sig) = sign(self.api_secret.expose_secret(), &params);

        let url = format!("{}/v3/query_order", self.base);
        let req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(HEADER_API_KEY, &self.api_key)
            .header(HEADER_SIGNATURE, sig)
            .body(body);

        let rsp: QueryOrderResponse = self.call("query_order", req).await?;

        let mut orders: Vec<OrderRecord> = rsp.order_matched.into_iter().map(Into::into).collect();
        if pending_only {
            let before = orders.len();
            orders.retain(|o| o.status.is_pending());
            let dropped = before - orders.len();
            if dropped > 0 {
                debug!(dropped, "dropped non-pending orders from pending-only query");
            }
        }

        Ok(OrderQueryResult {
            success: rsp.success,
            orders,
            error_message: rsp.err_msg.filter(|m| !m.is_empty()),
        })
    }

    pub async fn query_orders(&self, pair: Option<&str>, pending_only: bool) -> OrderQueryResult {
        match self.fetch_orders(pair, pending_only).await {
            Ok(r) => r,
            Err(e) => OrderQueryResult::failure(e.to_string()),
        }
    }

    // ---- Transport ----

    /// One round trip. The envelope verdict is checked before the outcome
    /// is logged and counted.
    async fn call<T: DeserializeOwned + Envelope>(
        &self,
        endpoint: &'static str,
        req: RequestBuilder,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let res = exchange::<T>(endpoint, req).await;
        API_LATENCY
            .with_label_values(&[endpoint])
            .observe(started.elapsed().as_secs_f64());

        match &res {
            Ok(rsp) => match rsp.rejection() {
                Some(message) => warn!(endpoint, %message, "api call rejected by exchange"),
                None => debug!(endpoint, "api call ok"),
            },
            Err(e) => warn!(endpoint, error = %e, "api call failed"),
        }
        API_REQUESTS.with_label_values(&[endpoint, outcome_of(&res)]).inc();
        res
    }
}

/// Metric label for a finished call. `Success:false` counts as `auth`.
fn outcome_of<T: Envelope>(res: &Result<T, ApiError>) -> &'static str {
    match res {
        Ok(rsp) if rsp.rejection().is_some() => "auth",
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base)
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

async fn exchange<T: DeserializeOwned>(
    endpoint: &'static str,
    req: RequestBuilder,
) -> Result<T, ApiError> {
    let rsp = req
        .send()
        .await
        .map_err(|e| ApiError::Connectivity(e.to_string()))?;
    let status = rsp.status();
    let body = rsp
        .text()
        .await
        .map_err(|e| ApiError::Connectivity(e.to_string()))?;

    if !status.is_success() {
        let message = server_message(&body);
        return Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Authentication {
                status: status.as_u16(),
                message,
            },
            _ => ApiError::Rejected {
                status: status.as_u16(),
                message,
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| ApiError::Malformed {
        endpoint,
        reason: e.to_string(),
    })
}

/// `ErrMsg` from a JSON error body, else the (shortened) raw body.
fn server_message(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = v.get("ErrMsg").and_then(|m| m.as_str()).filter(|m| !m.is_empty()) {
            return msg.to_string();
        }
    }
    body.chars().take(MAX_CHARS).collect()
}
