// ===============================
// src/domain.rs
// ===============================
use std::collections::BTreeMap;

use ahash::AHashSet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::roostoo::{ExchangeInfoResponse, WireOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell, Unknown }
impl Side {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() { "BUY" => Side::Buy, "SELL" => Side::Sell, _ => Side::Unknown }
    }
    pub fn as_str(&self) -> &'static str {
        match self { Side::Buy => "BUY", Side::Sell => "SELL", Side::Unknown => "?" }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus { Pending, Filled, Canceled, Other(String) }
impl OrderStatus {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => OrderStatus::Pending,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" | "CANCELLED" => OrderStatus::Canceled,
            _ => OrderStatus::Other(s.to_string()),
        }
    }
    pub fn is_pending(&self) -> bool { matches!(self, OrderStatus::Pending) }
    pub fn label(&self) -> &str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Other(s) => s,
        }
    }
}

/// Free/locked quantity of one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance { pub free: Decimal, pub locked: Decimal }
impl AssetBalance {
    pub fn total(&self) -> Decimal { self.free + self.locked }
    pub fn is_zero(&self) -> bool { self.total().is_zero() }
}

/// Per-asset balances, ordered by asset name.
pub type Balances = BTreeMap<String, AssetBalance>;

/// Number of assets holding a non-zero balance ("Assets Held").
pub fn assets_held(b: &Balances) -> usize {
    b.values().filter(|a| !a.is_zero()).count()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: u64,
    pub pair: String,
    pub side: Side,
    pub order_type: String,
    pub status: OrderStatus,
    pub price: Decimal,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub filled_avg_price: Decimal,
    pub created_ms: u64,
    pub finished_ms: u64,
}

impl From<WireOrder> for OrderRecord {
    fn from(w: WireOrder) -> Self {
        OrderRecord {
            order_id: w.order_id,
            side: Side::parse(&w.side),
            status: OrderStatus::parse(&w.status),
            pair: w.pair,
            order_type: w.r#type,
            price: w.price,
            quantity: w.quantity,
            filled_quantity: w.filled_quantity,
            filled_avg_price: w.filled_aver_price,
            created_ms: w.create_timestamp,
            finished_ms: w.finish_timestamp,
        }
    }
}

/// Uniform result of an order query; failures carry `success = false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderQueryResult {
    pub success: bool,
    pub orders: Vec<OrderRecord>,
    pub error_message: Option<String>,
}

impl OrderQueryResult {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self { success: false, orders: Vec::new(), error_message: Some(msg.into()) }
    }

    /// Distinct pairs across the returned orders ("Active Trading Pairs").
    pub fn distinct_pairs(&self) -> usize {
        if !self.success {
            return 0;
        }
        self.orders.iter().map(|o| o.pair.as_str()).collect::<AHashSet<_>>().len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePair {
    pub coin: String,
    pub unit: String,
    pub can_trade: bool,
    pub price_precision: u32,
    pub amount_precision: u32,
    pub min_order: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeStatus {
    pub is_running: bool,
    pub initial_wallet: BTreeMap<String, Decimal>,
    pub trade_pairs: BTreeMap<String, TradePair>,
}

impl From<ExchangeInfoResponse> for ExchangeStatus {
    fn from(r: ExchangeInfoResponse) -> Self {
        let trade_pairs = r
            .trade_pairs
            .into_iter()
            .map(|(name, p)| {
                (name, TradePair {
                    coin: p.coin,
                    unit: p.unit,
                    can_trade: p.can_trade,
                    price_precision: p.price_precision,
                    amount_precision: p.amount_precision,
                    min_order: p.mini_order,
                })
            })
            .collect();
        ExchangeStatus { is_running: r.is_running, initial_wallet: r.initial_wallet, trade_pairs }
    }
}
