//! Price-change + volume-surge spike detection, with a per-market cooldown.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::portfolio::VirtualPortfolio;
use crate::strategies::Strategy;
use crate::types::{MarketSnapshot, OrderSide, StrategySignal};

const NAME: &str = "spike_detector";

#[derive(Clone, Copy)]
struct PricePoint {
    timestamp: DateTime<Utc>,
    price: f64,
    volume: f64,
}

#[derive(Clone, Copy, PartialEq)]
pub enum SpikeMode {
    MeanReversion,
    Momentum,
}

struct MarketState {
    history: VecDeque<PricePoint>,
    last_signal_at: Option<DateTime<Utc>>,
}

pub struct SpikeDetectorStrategy {
    spike_threshold: f64,
    lookback_periods: usize,
    min_volume_spike: f64,
    mode: SpikeMode,
    cooldown_minutes: i64,
    max_position_per_market: f64,
    state: HashMap<String, MarketState>,
}

impl SpikeDetectorStrategy {
    pub fn new() -> Self {
        Self {
            spike_threshold: 0.05,
            lookback_periods: 10,
            min_volume_spike: 2.0,
            mode: SpikeMode::MeanReversion,
            cooldown_minutes: 30,
            max_position_per_market: 200.0,
            state: HashMap::new(),
        }
    }

    pub fn with_mode(mode: SpikeMode) -> Self {
        Self { mode, ..Self::new() }
    }
}

impl Default for SpikeDetectorStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for SpikeDetectorStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Price-change and volume-surge spike detection with a cooldown"
    }

    fn on_market_update(&mut self, snapshot: &MarketSnapshot, _portfolio: &VirtualPortfolio) -> Vec<StrategySignal> {
        let state = self.state.entry(snapshot.market_id.clone()).or_insert_with(|| MarketState {
            history: VecDeque::with_capacity(self.lookback_periods * 2),
            last_signal_at: None,
        });

        // History is appended before the cooldown short-circuit, so the
        // buffer keeps filling during a cooldown window.
        state.history.push_back(PricePoint {
            timestamp: snapshot.timestamp,
            price: snapshot.yes_price,
            volume: snapshot.volume_24h,
        });
        while state.history.len() > self.lookback_periods * 2 {
            state.history.pop_front();
        }

        if let Some(last) = state.last_signal_at {
            let elapsed = (snapshot.timestamp - last).num_minutes();
            if elapsed < self.cooldown_minutes {
                return Vec::new();
            }
        }

        if state.history.len() < self.lookback_periods {
            return Vec::new();
        }

        let window: Vec<&PricePoint> = state.history.iter().rev().skip(1).take(self.lookback_periods).collect();
        if window.is_empty() {
            return Vec::new();
        }
        let avg_price = window.iter().map(|p| p.price).sum::<f64>() / window.len() as f64;
        let avg_volume = window.iter().map(|p| p.volume).sum::<f64>() / window.len() as f64;

        let price_change = if avg_price > 0.0 { (snapshot.yes_price - avg_price) / avg_price } else { 0.0 };
        if price_change.abs() < self.spike_threshold {
            return Vec::new();
        }
        let volume_ratio = if avg_volume > 0.0 { snapshot.volume_24h / avg_volume } else { 1.0 };
        if volume_ratio < self.min_volume_spike {
            return Vec::new();
        }

        let going_up = price_change > 0.0;
        let side = match (self.mode, going_up) {
            (SpikeMode::Momentum, true) => OrderSide::BuyYes,
            (SpikeMode::Momentum, false) => OrderSide::BuyNo,
            (SpikeMode::MeanReversion, true) => OrderSide::BuyNo,
            (SpikeMode::MeanReversion, false) => OrderSide::BuyYes,
        };

        let confidence = (price_change.abs() / (2.0 * self.spike_threshold)).min(1.0);
        let target_price = match self.mode {
            SpikeMode::MeanReversion => Some(avg_price),
            SpikeMode::Momentum => None,
        };
        let stop_loss = if going_up { snapshot.yes_price * 0.9 } else { snapshot.yes_price * 1.1 };

        state.last_signal_at = Some(snapshot.timestamp);

        vec![StrategySignal {
            strategy: NAME.to_string(),
            market_id: snapshot.market_id.clone(),
            platform: snapshot.platform,
            side,
            size: self.max_position_per_market,
            confidence,
            target_price,
            stop_loss: Some(stop_loss),
            take_profit: None,
            metadata: HashMap::new(),
        }]
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

    fn snap(price: f64, volume: f64, t: i64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: Utc.timestamp_opt(1_700_000_000 + t * 60, 0).unwrap(),
            question: "?".into(),
            yes_price: price,
            no_price: 1.0 - price,
            volume_24h: volume,
            liquidity: 0.0,
            resolution_date: None,
            status: MarketStatus::Active,
            tags: vec![],
            metadata: Default::default(),
        }
    }

    #[test]
    fn quiet_market_produces_no_signal() {
        let mut strat = SpikeDetectorStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        let mut signals = Vec::new();
        for i in 0..15 {
            signals = strat.on_market_update(&snap(0.5, 100.0, i), &portfolio);
        }
        assert!(signals.is_empty());
    }

    #[test]
    fn price_and_volume_spike_triggers_mean_reversion_signal() {
        let mut strat = SpikeDetectorStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        for i in 0..12 {
            strat.on_market_update(&snap(0.5, 100.0, i), &portfolio);
        }
        let signals = strat.on_market_update(&snap(0.6, 400.0, 12), &portfolio);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::BuyNo);
    }

    #[test]
    fn cooldown_suppresses_repeat_signals() {
        let mut strat = SpikeDetectorStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        for i in 0..12 {
            strat.on_market_update(&snap(0.5, 100.0, i), &portfolio);
        }
        let first = strat.on_market_update(&snap(0.6, 400.0, 12), &portfolio);
        assert_eq!(first.len(), 1);
        let second = strat.on_market_update(&snap(0.65, 500.0, 13), &portfolio);
        assert!(second.is_empty());
    }
}
