// ===============================
// src/roostoo.rs
// ===============================
//
// Roostoo REST helpers:
// - SignedParams  : parameter map yang selalu terurut per key (BTreeMap)
// - sign_query    : HMAC-SHA256 hex atas canonical query string
// - wire models   : envelope JSON mentah dari /v3/*
//
// Canonical string = `k1=v1&k2=v2...` tanpa URL-encoding. Bytes yang
// dikirim ke server harus sama persis dengan bytes yang ditandatangani.
//
use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

pub const HEADER_API_KEY: &str = "RST-API-KEY";
pub const HEADER_SIGNATURE: &str = "MSG-SIGNATURE";

/// Request parameters, kept in ascending byte order of the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedParams(BTreeMap<String, String>);

impl SignedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the mandatory `timestamp` parameter.
    pub fn with_timestamp(ts_ms: u64) -> Self {
        let mut p = Self::new();
        p.insert("timestamp", ts_ms);
        p
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.insert(key.into(), value.to_string());
        self
    }

    pub fn canonical(&self) -> String {
        canonical_query(self.0.iter())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for SignedParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut p = Self::new();
        for (k, v) in iter {
            p.insert(k, v);
        }
        p
    }
}

/// Sort by key and join as `key=value` with `&`. Values are taken raw.
pub fn canonical_query<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut sorted: Vec<(&String, &String)> = pairs.into_iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

pub fn sign_query(secret: &str, query: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC key");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Canonical string plus its signature, computed fresh for each request.
pub fn sign(secret: &str, params: &SignedParams) -> (String, String) {
    let query = params.canonical();
    let sig = sign_query(secret, &query);
    (query, sig)
}

// ---- Wire models (PascalCase envelopes) ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerTimeResponse {
    pub server_time: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExchangeInfoResponse {
    pub is_running: bool,
    #[serde(default)]
    pub initial_wallet: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub trade_pairs: BTreeMap<String, WireTradePair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireTradePair {
    #[serde(default)]
    pub coin: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub can_trade: bool,
    #[serde(default)]
    pub price_precision: u32,
    #[serde(default)]
    pub amount_precision: u32,
    #[serde(default)]
    pub mini_order: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BalanceResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub err_msg: Option<String>,
    #[serde(default)]
    pub spot_wallet: BTreeMap<String, WalletEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WalletEntry {
    #[serde(default)]
    pub free: Decimal,
    #[serde(default)]
    pub lock: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub err_msg: Option<String>,
    #[serde(default)]
    pub order_matched: Vec<WireOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireOrder {
    #[serde(rename = "OrderID", default)]
    pub order_id: u64,
    pub pair: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub filled_quantity: Decimal,
    #[serde(default)]
    pub filled_aver_price: Decimal,
    #[serde(default)]
    pub create_timestamp: u64,
    #[serde(default)]
    pub finish_timestamp: u64,
}

/// Verdict carried inside a 2xx body.
pub trait Envelope {
    /// `Some(ErrMsg)` when the exchange answered `Success:false`.
    fn rejection(&self) -> Option<String> {
        None
    }
}

impl Envelope for ServerTimeResponse {}
impl Envelope for ExchangeInfoResponse {}

impl Envelope for BalanceResponse {
    fn rejection(&self) -> Option<String> {
        (!self.success).then(|| self.err_msg.clone().unwrap_or_default())
    }
}

impl Envelope for QueryOrderResponse {
    fn rejection(&self) -> Option<String> {
        (!self.success).then(|| self.err_msg.clone().unwrap_or_default())
    }
}

fn default_true() -> bool {
    true
}
