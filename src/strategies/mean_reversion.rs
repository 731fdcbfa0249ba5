//! Z-score / Bollinger-band mean reversion with a fixed hold period.

use std::collections::{HashMap, VecDeque};

use crate::portfolio::VirtualPortfolio;
use crate::strategies::Strategy;
use crate::types::{MarketSnapshot, OrderSide, StrategySignal};

const NAME: &str = "mean_reversion";

struct MarketState {
    prices: VecDeque<f64>,
    entry_time: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct MeanReversionStrategy {
    lookback_period: usize,
    z_score_entry: f64,
    z_score_exit: f64,
    bollinger_std: f64,
    min_std_dev: f64,
    max_position_per_market: f64,
    hold_period_hours: i64,
    state: HashMap<String, MarketState>,
}

impl MeanReversionStrategy {
    pub fn new() -> Self {
        Self {
            lookback_period: 20,
            z_score_entry: 2.0,
            z_score_exit: 0.5,
            bollinger_std: 2.0,
            min_std_dev: 0.01,
            max_position_per_market: 300.0,
            hold_period_hours: 24,
            state: HashMap::new(),
        }
    }

    fn mean_std(prices: &VecDeque<f64>) -> (f64, f64) {
        let n = prices.len() as f64;
        let mean = prices.iter().sum::<f64>() / n;
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Z-score/Bollinger band mean reversion with a fixed hold period"
    }

    fn on_market_update(&mut self, snapshot: &MarketSnapshot, portfolio: &VirtualPortfolio) -> Vec<StrategySignal> {
        let state = self.state.entry(snapshot.market_id.clone()).or_insert_with(|| MarketState {
            prices: VecDeque::with_capacity(self.lookback_period * 2),
            entry_time: None,
        });

        let price = snapshot.yes_price;
        state.prices.push_back(price);
        while state.prices.len() > self.lookback_period * 2 {
            state.prices.pop_front();
        }

        // Hold-period expiry takes priority over any fresh entry/exit
        // decision and forces a full exit.
        if let Some(entry_time) = state.entry_time {
            let held_hours = (snapshot.timestamp - entry_time).num_minutes() as f64 / 60.0;
            if held_hours >= self.hold_period_hours as f64 {
                state.entry_time = None;
                if let Some(position) = portfolio.get_position(&snapshot.market_id) {
                    let mut signals = Vec::new();
                    if position.yes_shares > 0.0 {
                        signals.push(StrategySignal {
                            strategy: NAME.to_string(),
                            market_id: snapshot.market_id.clone(),
                            platform: snapshot.platform,
                            side: OrderSide::SellYes,
                            size: position.yes_shares,
                            confidence: 0.6,
                            target_price: None,
                            stop_loss: None,
                            take_profit: None,
                            metadata: HashMap::new(),
                        });
                    }
                    if position.no_shares > 0.0 {
                        signals.push(StrategySignal {
                            strategy: NAME.to_string(),
                            market_id: snapshot.market_id.clone(),
                            platform: snapshot.platform,
                            side: OrderSide::SellNo,
                            size: position.no_shares,
                            confidence: 0.6,
                            target_price: None,
                            stop_loss: None,
                            take_profit: None,
                            metadata: HashMap::new(),
                        });
                    }
                    return signals;
                }
                return Vec::new();
            }
        }

        if state.prices.len() < self.lookback_period {
            return Vec::new();
        }

        let (mean, std_dev) = Self::mean_std(&state.prices);
        if std_dev < self.min_std_dev {
            return Vec::new();
        }

        let z_score = (price - mean) / std_dev;
        let bollinger_upper = mean + self.bollinger_std * std_dev;
        let bollinger_lower = mean - self.bollinger_std * std_dev;
        let is_overbought = price > bollinger_upper || z_score > self.z_score_entry;
        let is_oversold = price < bollinger_lower || z_score < -self.z_score_entry;

        let position = portfolio.get_position(&snapshot.market_id);
        let has_yes = position.map(|p| p.yes_shares > 0.0).unwrap_or(false);
        let has_no = position.map(|p| p.no_shares > 0.0).unwrap_or(false);

        if z_score.abs() < self.z_score_exit {
            let mut signals = Vec::new();
            if has_yes {
                signals.push(StrategySignal {
                    strategy: NAME.to_string(),
                    market_id: snapshot.market_id.clone(),
                    platform: snapshot.platform,
                    side: OrderSide::SellYes,
                    size: position.unwrap().yes_shares,
                    confidence: 0.8,
                    target_price: None,
                    stop_loss: None,
                    take_profit: None,
                    metadata: HashMap::new(),
                });
            }
            if has_no {
                signals.push(StrategySignal {
                    strategy: NAME.to_string(),
                    market_id: snapshot.market_id.clone(),
                    platform: snapshot.platform,
                    side: OrderSide::SellNo,
                    size: position.unwrap().no_shares,
                    confidence: 0.8,
                    target_price: None,
                    stop_loss: None,
                    take_profit: None,
                    metadata: HashMap::new(),
                });
            }
            if !signals.is_empty() {
                return signals;
            }
        }

        if !has_yes && !has_no {
            let confidence = (z_score.abs() / self.z_score_entry).min(1.0);
            if is_overbought {
                state.entry_time = Some(snapshot.timestamp);
                return vec![StrategySignal {
                    strategy: NAME.to_string(),
                    market_id: snapshot.market_id.clone(),
                    platform: snapshot.platform,
                    side: OrderSide::BuyNo,
                    size: self.max_position_per_market,
                    confidence,
                    target_price: Some(1.0 - mean),
                    stop_loss: Some((1.0 - bollinger_upper) * 0.95),
                    take_profit: Some(1.0 - mean),
                    metadata: HashMap::new(),
                }];
            }
            if is_oversold {
                state.entry_time = Some(snapshot.timestamp);
                return vec![StrategySignal {
                    strategy: NAME.to_string(),
                    market_id: snapshot.market_id.clone(),
                    platform: snapshot.platform,
                    side: OrderSide::BuyYes,
                    size: self.max_position_per_market,
                    confidence,
                    target_price: Some(mean),
                    stop_loss: Some(bollinger_lower * 0.95),
                    take_profit: Some(mean),
                    metadata: HashMap::new(),
                }];
            }
        }

        Vec::new()
    }

    fn reset(&mut self) {
        self.state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketStatus, Platform};
    use chrono::{Duration, TimeZone, Utc};

    fn snap(market_id: &str, price: f64, t: i64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: market_id.to_string(),
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
    fn does_not_signal_before_lookback_is_full() {
        let mut strat = MeanReversionStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        for i in 0..5 {
            let signals = strat.on_market_update(&snap("m1", 0.5, i), &portfolio);
            assert!(signals.is_empty());
        }
    }

    #[test]
    fn enters_no_on_sustained_overbought_drift() {
        let mut strat = MeanReversionStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        let mut signals = Vec::new();
        for i in 0..20 {
            signals = strat.on_market_update(&snap("m1", 0.50, i), &portfolio);
        }
        assert!(signals.is_empty());
        signals = strat.on_market_update(&snap("m1", 0.90, 21), &portfolio);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, OrderSide::BuyNo);
    }

    #[test]
    fn hold_period_expiry_forces_exit() {
        let mut strat = MeanReversionStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        strat.state.insert(
            "m1".to_string(),
            MarketState {
                prices: VecDeque::from(vec![0.5; 20]),
                entry_time: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            },
        );
        let later = snap("m1", 0.5, Duration::hours(25).num_seconds());
        let signals = strat.on_market_update(&later, &portfolio);
        assert!(signals.is_empty()); // no open position in portfolio to close
        assert!(strat.state.get("m1").unwrap().entry_time.is_none());
    }
}
