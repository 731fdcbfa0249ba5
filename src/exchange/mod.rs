//! Simulated exchange: holds live market/order-book state and routes
//! orders through a pluggable fill model, latency model and fee schedule.

pub mod fees;
pub mod fill_model;
pub mod latency;

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::FillRejectReason;
use crate::types::{FillResult, MarketSnapshot, Order, OrderBookSnapshot, OrderSide, OrderType};

pub use fees::FeeModel;
pub use fill_model::{BasicFillModel, FillModel, RealisticFillModel};
pub use latency::LatencyModel;

/// Owns the live market/book state a run's strategies see, and the
/// fill/latency/fee models orders are routed through.
pub struct SimulatedExchange {
    markets: HashMap<String, MarketSnapshot>,
    books: HashMap<String, OrderBookSnapshot>,
    fill_model: Box<dyn FillModel>,
    latency_model: LatencyModel,
    fee_model: FeeModel,
    rng: ChaCha8Rng,
    pending_orders: Vec<Order>,
    executed_orders: Vec<(Order, FillResult)>,
}

impl SimulatedExchange {
    pub fn new(fill_model: Box<dyn FillModel>, latency_model: LatencyModel, fee_model: FeeModel) -> Self {
        Self::seeded(fill_model, latency_model, fee_model, None)
    }

    /// `seed = None` draws from OS entropy; `Some(seed)` reproduces an
    /// identical fill/latency sequence across runs.
    pub fn seeded(
        fill_model: Box<dyn FillModel>,
        latency_model: LatencyModel,
        fee_model: FeeModel,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            markets: HashMap::new(),
            books: HashMap::new(),
            fill_model,
            latency_model,
            fee_model,
            rng,
            pending_orders: Vec::new(),
            executed_orders: Vec::new(),
        }
    }

    pub fn update_snapshot(&mut self, snapshot: MarketSnapshot) {
        self.markets.insert(snapshot.market_id.clone(), snapshot);
    }

    pub fn update_book(&mut self, book: OrderBookSnapshot) {
        self.books.insert(book.market_id.clone(), book);
    }

    pub fn get_market(&self, market_id: &str) -> Option<&MarketSnapshot> {
        self.markets.get(market_id)
    }

    pub fn current_prices(&self) -> HashMap<String, f64> {
        self.markets.iter().map(|(id, s)| (id.clone(), s.yes_price)).collect()
    }

    /// Current reference price a market order on `side` would be evaluated
    /// against: `yes_price` for YES-side orders, `no_price` for NO-side.
    pub fn get_market_price(&self, market_id: &str, side: OrderSide) -> Option<f64> {
        let snapshot = self.markets.get(market_id)?;
        Some(if side.is_yes() { snapshot.yes_price } else { snapshot.no_price })
    }

    /// Liquidity available to a taking order on `side`: summed from the
    /// live order book if one is tracked, else the market snapshot's
    /// aggregate `liquidity` field, else zero.
    pub fn get_available_liquidity(&self, market_id: &str, side: OrderSide) -> f64 {
        if let Some(book) = self.books.get(market_id) {
            return book.available_liquidity(side, None);
        }
        self.markets.get(market_id).map(|m| m.liquidity).unwrap_or(0.0)
    }

    /// Submit an order. Latency is sampled regardless of outcome; fees
    /// are only attached when the fill model reports a (partial or
    /// full) fill.
    pub fn submit_order(&mut self, order: &Order) -> FillResult {
        let Some(snapshot) = self.markets.get(&order.market_id) else {
            return FillResult::rejected(FillRejectReason::MarketNotFound.to_string());
        };
        let book = self.books.get(&order.market_id);
        let liquidity = self.get_available_liquidity(&order.market_id, order.side);
        let mut result = self.fill_model.simulate_fill(order, snapshot, book, liquidity, &mut self.rng);
        result.latency_ms = self.latency_model.sample(&mut self.rng);
        if result.filled() {
            let notional = result.filled_size * result.fill_price;
            let is_taker = order.order_type != OrderType::Limit;
            result.fees = self.fee_model.calculate_fee(order.platform, notional, result.filled_size, is_taker);
        }
        self.executed_orders.push((order.clone(), result.clone()));
        result
    }

    /// Cancel a resting order by id. Orders fill synchronously in
    /// `submit_order`, so this only ever matches something placed on
    /// `pending_orders` directly; in practice it returns `false`.
    pub fn cancel_order(&mut self, order_id: &str) -> bool {
        if let Some(idx) = self.pending_orders.iter().position(|o| o.order_id == order_id) {
            self.pending_orders.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn execution_history(&self) -> &[(Order, FillResult)] {
        &self.executed_orders
    }

    /// Clear all market, book and order state, keeping the configured
    /// models and rng stream.
    pub fn reset(&mut self) {
        self.markets.clear();
        self.books.clear();
        self.pending_orders.clear();
        self.executed_orders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketStatus, OrderSide, OrderType, Platform};
    use chrono::{TimeZone, Utc};

    fn ts() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn submit_order_rejects_unknown_market() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        let order = Order {
            order_id: "o1".into(),
            market_id: "missing".into(),
            platform: Platform::Polymarket,
            side: OrderSide::BuyYes,
            order_type: OrderType::Market,
            size: 10.0,
            limit_price: None,
            time_in_force: "GTC".into(),
            created_at: ts(),
        };
        let result = exchange.submit_order(&order);
        assert_eq!(result.reason.as_deref(), Some("market_not_found"));
    }

    #[test]
    fn submit_order_attaches_fees_on_fill() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        exchange.update_snapshot(MarketSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: ts(),
            question: "?".into(),
            yes_price: 0.4,
            no_price: 0.6,
            volume_24h: 0.0,
            liquidity: 1000.0,
            resolution_date: None,
            status: MarketStatus::Active,
            tags: vec![],
            metadata: Default::default(),
        });
        let order = Order {
            order_id: "o1".into(),
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            side: OrderSide::BuyYes,
            order_type: OrderType::Market,
            size: 10.0,
            limit_price: None,
            time_in_force: "GTC".into(),
            created_at: ts(),
        };
        let result = exchange.submit_order(&order);
        assert!(result.filled());
        assert!(result.latency_ms > 0.0);
    }

    fn market(market_id: &str, liquidity: f64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: market_id.into(),
            platform: Platform::Polymarket,
            timestamp: ts(),
            question: "?".into(),
            yes_price: 0.4,
            no_price: 0.6,
            volume_24h: 0.0,
            liquidity,
            resolution_date: None,
            status: MarketStatus::Active,
            tags: vec![],
            metadata: Default::default(),
        }
    }

    #[test]
    fn submit_order_charges_taker_fee_on_market_order_but_not_limit() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        exchange.update_snapshot(market("m1", 1000.0));

        let market_order = Order {
            order_id: "o1".into(),
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            side: OrderSide::BuyYes,
            order_type: OrderType::Market,
            size: 10.0,
            limit_price: None,
            time_in_force: "GTC".into(),
            created_at: ts(),
        };
        let result = exchange.submit_order(&market_order);
        assert!(result.fees > 0.0);

        let limit_order = Order {
            order_id: "o2".into(),
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            side: OrderSide::BuyYes,
            order_type: OrderType::Limit,
            size: 10.0,
            limit_price: Some(0.9),
            time_in_force: "GTC".into(),
            created_at: ts(),
        };
        let result = exchange.submit_order(&limit_order);
        if result.filled() {
            assert_eq!(result.fees, 0.0);
        }
    }

    #[test]
    fn submit_order_sets_latency_even_when_rejected() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        exchange.update_snapshot(market("m1", 0.0));
        let order = Order {
            order_id: "o1".into(),
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            side: OrderSide::BuyYes,
            order_type: OrderType::Market,
            size: 10.0,
            limit_price: None,
            time_in_force: "GTC".into(),
            created_at: ts(),
        };
        let result = exchange.submit_order(&order);
        assert_eq!(result.reason.as_deref(), Some("no_liquidity"));
        assert!(result.latency_ms > 0.0);
    }

    #[test]
    fn get_market_price_and_liquidity_reflect_latest_snapshot() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        assert_eq!(exchange.get_market_price("m1", OrderSide::BuyYes), None);
        exchange.update_snapshot(market("m1", 500.0));
        assert_eq!(exchange.get_market_price("m1", OrderSide::BuyYes), Some(0.4));
        assert_eq!(exchange.get_market_price("m1", OrderSide::SellNo), Some(0.6));
        assert_eq!(exchange.get_available_liquidity("m1", OrderSide::BuyYes), 500.0);
    }

    #[test]
    fn cancel_order_on_empty_pending_queue_returns_false() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        assert!(!exchange.cancel_order("o1"));
    }

    #[test]
    fn submit_order_appends_to_execution_history_and_reset_clears_it() {
        let mut exchange = SimulatedExchange::seeded(
            Box::new(BasicFillModel::default()),
            LatencyModel::default(),
            FeeModel::default(),
            Some(1),
        );
        exchange.update_snapshot(market("m1", 1000.0));
        let order = Order {
            order_id: "o1".into(),
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            side: OrderSide::BuyYes,
            order_type: OrderType::Market,
            size: 10.0,
            limit_price: None,
            time_in_force: "GTC".into(),
            created_at: ts(),
        };
        exchange.submit_order(&order);
        assert_eq!(exchange.execution_history().len(), 1);
        exchange.reset();
        assert_eq!(exchange.execution_history().len(), 0);
        assert!(exchange.get_market("m1").is_none());
    }
}
