//! Core data model: market snapshots, order books, trades, resolutions,
//! orders, positions and the simulation event sum type.
//!
//! These are pure values -- no I/O, no exchange/portfolio logic lives here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported prediction-market platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Polymarket,
    Kalshi,
    Manifold,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Polymarket => "polymarket",
            Platform::Kalshi => "kalshi",
            Platform::Manifold => "manifold",
        }
    }
}

/// Order side for a binary prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    BuyYes,
    BuyNo,
    SellYes,
    SellNo,
}

impl OrderSide {
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::BuyYes | OrderSide::BuyNo)
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, OrderSide::BuyYes | OrderSide::SellYes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Resolved,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolutionOutcome {
    Yes,
    No,
    Cancelled,
    Ambiguous,
}

/// Point-in-time snapshot of a prediction market's top-of-book prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_id: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub yes_price: f64,
    pub no_price: f64,
    #[serde(default)]
    pub volume_24h: f64,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default)]
    pub resolution_date: Option<DateTime<Utc>>,
    #[serde(default = "default_status")]
    pub status: MarketStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_status() -> MarketStatus {
    MarketStatus::Active
}

impl MarketSnapshot {
    /// `|yes_price + no_price - 1|`. Spread is allowed to exist.
    pub fn spread(&self) -> f64 {
        (self.yes_price + self.no_price - 1.0).abs()
    }
}

/// Single resting level in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub size: f64,
    #[serde(default = "one")]
    pub order_count: u32,
}

fn one() -> u32 {
    1
}

/// Point-in-time order book. `bids` sorted descending by price, `asks`
/// ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub market_id: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.price)
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// Sum of sizes on the taking side (asks for buys, bids for sells),
    /// optionally capped to levels at-or-better than `max_price`.
    pub fn available_liquidity(&self, side: OrderSide, max_price: Option<f64>) -> f64 {
        let levels: Vec<&OrderBookLevel> = if side.is_buy() {
            self.asks
                .iter()
                .filter(|l| max_price.map(|mp| l.price <= mp).unwrap_or(true))
                .collect()
        } else {
            self.bids
                .iter()
                .filter(|l| max_price.map(|mp| l.price >= mp).unwrap_or(true))
                .collect()
        };
        levels.iter().map(|l| l.size).sum()
    }
}

/// Record of an executed trade (fill), used both for the ledger and
/// historical replay/import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub trade_id: String,
    pub market_id: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
    pub size: f64,
    #[serde(default = "default_true")]
    pub is_taker: bool,
    #[serde(default)]
    pub fees: f64,
}

fn default_true() -> bool {
    true
}

impl TradeEvent {
    pub fn notional_value(&self) -> f64 {
        self.price * self.size
    }
}

/// Terminal settlement event for a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketResolution {
    pub market_id: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
    pub outcome: ResolutionOutcome,
    #[serde(default)]
    pub question: String,
}

/// Order to submit to the simulated exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub market_id: String,
    pub platform: Platform,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub size: f64,
    #[serde(default)]
    pub limit_price: Option<f64>,
    #[serde(default = "default_tif")]
    pub time_in_force: String,
    pub created_at: DateTime<Utc>,
}

fn default_tif() -> String {
    "GTC".to_string()
}

impl Order {
    /// `size>0`; a limit order must carry a `limit_price` in `[0,1]`.
    pub fn validate(&self) -> bool {
        if self.size <= 0.0 {
            return false;
        }
        if let Some(lp) = self.limit_price {
            if !(0.0..=1.0).contains(&lp) {
                return false;
            }
        }
        if self.order_type == OrderType::Limit && self.limit_price.is_none() {
            return false;
        }
        true
    }
}

/// Dual-sided YES/NO position in a single market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: String,
    pub platform: Platform,
    pub yes_shares: f64,
    pub no_shares: f64,
    pub yes_avg_price: f64,
    pub no_avg_price: f64,
    pub yes_cost_basis: f64,
    pub no_cost_basis: f64,
    pub opened_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Position {
    pub fn new(market_id: String, platform: Platform, now: DateTime<Utc>) -> Self {
        Self {
            market_id,
            platform,
            yes_shares: 0.0,
            no_shares: 0.0,
            yes_avg_price: 0.0,
            no_avg_price: 0.0,
            yes_cost_basis: 0.0,
            no_cost_basis: 0.0,
            opened_at: now,
            last_updated: now,
        }
    }

    pub fn total_cost_basis(&self) -> f64 {
        self.yes_cost_basis + self.no_cost_basis
    }

    pub fn is_flat(&self) -> bool {
        self.yes_shares <= 0.0 && self.no_shares <= 0.0
    }

    pub fn market_value(&self, yes_price: f64) -> f64 {
        self.yes_shares * yes_price + self.no_shares * (1.0 - yes_price)
    }
}

/// Outcome status of a fill attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Filled,
    Partial,
    Rejected,
    Cancelled,
}

/// Result of submitting an order to the simulated exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillResult {
    pub status: FillStatus,
    pub filled_size: f64,
    pub fill_price: f64,
    pub fees: f64,
    pub slippage: f64,
    pub latency_ms: f64,
    pub reason: Option<String>,
}

impl FillResult {
    pub fn filled(&self) -> bool {
        matches!(self.status, FillStatus::Filled | FillStatus::Partial)
    }

    pub fn total_cost(&self) -> f64 {
        self.filled_size * self.fill_price + self.fees
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: FillStatus::Rejected,
            filled_size: 0.0,
            fill_price: 0.0,
            fees: 0.0,
            slippage: 0.0,
            latency_ms: 0.0,
            reason: Some(reason.into()),
        }
    }
}

/// Rich signal emitted by a strategy. Converts to an `Order` by the
/// engine: `Market` unless `target_price` is set, in which case `Limit`
/// at that price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy: String,
    pub market_id: String,
    pub platform: Platform,
    pub side: OrderSide,
    pub size: f64,
    pub confidence: f64,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StrategySignal {
    /// `Market` order unless a `target_price` was set, in which case a
    /// `Limit` order at that price.
    pub fn to_order(&self, order_id: String, created_at: DateTime<Utc>) -> Order {
        let (order_type, limit_price) = match self.target_price {
            Some(p) => (OrderType::Limit, Some(p)),
            None => (OrderType::Market, None),
        };
        Order {
            order_id,
            market_id: self.market_id.clone(),
            platform: self.platform,
            side: self.side,
            order_type,
            size: self.size,
            limit_price,
            time_in_force: "GTC".to_string(),
            created_at,
        }
    }
}

/// External news/correlation event. No built-in strategy acts on it; the
/// engine still dispatches it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub timestamp: DateTime<Utc>,
    pub headline: String,
    pub source: String,
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub related_markets: Vec<String>,
}

/// Closed sum type of everything that can occur during a simulation run.
/// Variants carry their own timestamp and sort by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SimulationEvent {
    MarketUpdate {
        timestamp: DateTime<Utc>,
        market_id: String,
        platform: Platform,
        yes_price: f64,
        no_price: f64,
        #[serde(default)]
        volume: f64,
        #[serde(default)]
        liquidity: f64,
    },
    OrderBookUpdate {
        timestamp: DateTime<Utc>,
        book: OrderBookSnapshot,
    },
    Resolution {
        timestamp: DateTime<Utc>,
        resolution: MarketResolution,
    },
    News(NewsEvent),
}

impl SimulationEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SimulationEvent::MarketUpdate { timestamp, .. } => *timestamp,
            SimulationEvent::OrderBookUpdate { timestamp, .. } => *timestamp,
            SimulationEvent::Resolution { timestamp, .. } => *timestamp,
            SimulationEvent::News(n) => n.timestamp,
        }
    }

    /// Stable ordering key for events sharing a timestamp: market
    /// updates, then book updates, then resolutions, then news.
    pub fn intra_tick_rank(&self) -> u8 {
        match self {
            SimulationEvent::MarketUpdate { .. } => 0,
            SimulationEvent::OrderBookUpdate { .. } => 1,
            SimulationEvent::Resolution { .. } => 2,
            SimulationEvent::News(_) => 3,
        }
    }
}
