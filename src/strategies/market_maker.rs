//! EMA fair-value two-sided quoting with inventory skew.
//!
//! Quotes both YES and NO directly (it never rests a sell order) --
//! matching the behaviour observed in the reference implementation this
//! was ported from, rather than the textbook single-sided-ask design.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::portfolio::VirtualPortfolio;
use crate::strategies::Strategy;
use crate::types::{MarketSnapshot, OrderSide, StrategySignal};

const NAME: &str = "market_maker";
const EMA_ALPHA: f64 = 0.3;

struct MarketState {
    history: VecDeque<f64>,
    last_quoted_at: Option<DateTime<Utc>>,
}

pub struct MarketMakerStrategy {
    target_spread: f64,
    min_spread: f64,
    quote_size: f64,
    max_inventory: f64,
    inventory_skew: f64,
    refresh_interval_seconds: i64,
    min_edge: f64,
    state: HashMap<String, MarketState>,
}

impl MarketMakerStrategy {
    pub fn new() -> Self {
        Self {
            target_spread: 0.02,
            min_spread: 0.01,
            quote_size: 100.0,
            max_inventory: 500.0,
            inventory_skew: 0.5,
            refresh_interval_seconds: 60,
            min_edge: 0.005,
            state: HashMap::new(),
        }
    }

    /// Re-folds the EMA from the oldest point still in the (bounded,
    /// maxlen-20) history window on every call, rather than updating a
    /// single running value -- so the effective seed drifts forward as
    /// old points age out of the window.
    fn estimate_fair_value(history: &VecDeque<f64>, current_price: f64) -> f64 {
        if history.len() < 3 {
            return current_price;
        }
        let mut iter = history.iter();
        let mut fair = *iter.next().unwrap();
        for &p in iter {
            fair = EMA_ALPHA * p + (1.0 - EMA_ALPHA) * fair;
        }
        fair
    }

    fn inventory_adjustment(&self, yes_shares: f64, no_shares: f64) -> f64 {
        let net = yes_shares - no_shares;
        let ratio = (net / self.max_inventory).clamp(-1.0, 1.0);
        ratio * self.inventory_skew * self.target_spread
    }

    fn calculate_quotes(&self, fair_value: f64, adjustment: f64) -> (f64, f64) {
        let half_spread = self.target_spread / 2.0;
        let mut bid = fair_value - half_spread - adjustment;
        let mut ask = fair_value + half_spread - adjustment;
        if ask - bid < self.min_spread {
            let mid = (bid + ask) / 2.0;
            bid = mid - self.min_spread / 2.0;
            ask = mid + self.min_spread / 2.0;
        }
        bid = bid.clamp(0.01, 0.98);
        ask = ask.clamp(0.02, 0.99);
        if ask <= bid {
            ask = bid + self.min_spread;
        }
        (bid, ask)
    }
}

impl Default for MarketMakerStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MarketMakerStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "EMA fair-value two-sided quoting with inventory skew"
    }

    fn on_market_update(&mut self, snapshot: &MarketSnapshot, portfolio: &VirtualPortfolio) -> Vec<StrategySignal> {
        let state = self.state.entry(snapshot.market_id.clone()).or_insert_with(|| MarketState {
            history: VecDeque::with_capacity(20),
            last_quoted_at: None,
        });
        state.history.push_back(snapshot.yes_price);
        while state.history.len() > 20 {
            state.history.pop_front();
        }

        let should_refresh = match state.last_quoted_at {
            None => true,
            Some(last) => (snapshot.timestamp - last).num_seconds() >= self.refresh_interval_seconds,
        };
        if !should_refresh {
            return Vec::new();
        }

        let fair_value = Self::estimate_fair_value(&state.history, snapshot.yes_price);
        let current_mid = (snapshot.yes_price + (1.0 - snapshot.no_price)) / 2.0;
        if (fair_value - current_mid).abs() < self.min_edge {
            return Vec::new();
        }

        let (yes_shares, no_shares) = portfolio
            .get_position(&snapshot.market_id)
            .map(|p| (p.yes_shares, p.no_shares))
            .unwrap_or((0.0, 0.0));
        let adjustment = self.inventory_adjustment(yes_shares, no_shares);
        let (bid, ask) = self.calculate_quotes(fair_value, adjustment);

        state.last_quoted_at = Some(snapshot.timestamp);

        let mut signals = Vec::new();
        if yes_shares < self.max_inventory {
            signals.push(StrategySignal {
                strategy: NAME.to_string(),
                market_id: snapshot.market_id.clone(),
                platform: snapshot.platform,
                side: OrderSide::BuyYes,
                size: self.quote_size.min(self.max_inventory - yes_shares),
                confidence: 0.5,
                target_price: Some(bid),
                stop_loss: None,
                take_profit: None,
                metadata: HashMap::new(),
            });
        }
        if no_shares < self.max_inventory {
            signals.push(StrategySignal {
                strategy: NAME.to_string(),
                market_id: snapshot.market_id.clone(),
                platform: snapshot.platform,
                side: OrderSide::BuyNo,
                size: self.quote_size.min(self.max_inventory - no_shares),
                confidence: 0.5,
                target_price: Some(1.0 - ask),
                stop_loss: None,
                take_profit: None,
                metadata: HashMap::new(),
            });
        }

        signals
    }

    fn reset(&mut self) {
        self.state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketStatus, Platform};
    use chrono::{TimeZone, Utc};

    fn snap(price: f64, t: i64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap(),
            question: "?".into(),
            yes_price: price,
            no_price: 1.0 - price,
            volume_24h: 0.0,
            liquidity: 0.0,
            resolution_date: None,
            status: MarketStatus::Active,
            tags: vec![],
            metadata: Default::default(),
        }
    }

    #[test]
    fn fair_value_equals_current_price_below_three_samples() {
        let mut history = VecDeque::new();
        history.push_back(0.4);
        history.push_back(0.5);
        assert_eq!(MarketMakerStrategy::estimate_fair_value(&history, 0.5), 0.5);
    }

    #[test]
    fn first_tick_always_refreshes_quotes() {
        let mut strat = MarketMakerStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        let signals = strat.on_market_update(&snap(0.40, 0), &portfolio);
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().any(|s| s.side == OrderSide::BuyYes));
        assert!(signals.iter().any(|s| s.side == OrderSide::BuyNo));
    }

    #[test]
    fn refresh_interval_suppresses_immediate_requote() {
        let mut strat = MarketMakerStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        strat.on_market_update(&snap(0.40, 0), &portfolio);
        let signals = strat.on_market_update(&snap(0.41, 5), &portfolio);
        assert!(signals.is_empty());
    }

    #[test]
    fn quotes_respect_min_spread_floor() {
        let strat = MarketMakerStrategy::new();
        let (bid, ask) = strat.calculate_quotes(0.5, 0.0);
        assert!(ask - bid >= strat.min_spread - 1e-9);
    }
}
