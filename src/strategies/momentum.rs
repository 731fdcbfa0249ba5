//! RSI + momentum + trend-strength (R²) directional strategy.

use std::collections::{HashMap, VecDeque};

use crate::portfolio::VirtualPortfolio;
use crate::strategies::Strategy;
use crate::types::{MarketSnapshot, OrderSide, StrategySignal};

const NAME: &str = "momentum";

#[derive(PartialEq)]
enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

pub struct MomentumStrategy {
    rsi_period: usize,
    rsi_overbought: f64,
    rsi_oversold: f64,
    momentum_period: usize,
    min_trend_strength: f64,
    entry_threshold: f64,
    exit_threshold: f64,
    max_position_per_market: f64,
    prices: HashMap<String, VecDeque<f64>>,
}

impl MomentumStrategy {
    pub fn new() -> Self {
        Self {
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            momentum_period: 10,
            min_trend_strength: 0.3,
            entry_threshold: 0.02,
            exit_threshold: -0.01,
            max_position_per_market: 300.0,
            prices: HashMap::new(),
        }
    }

    fn calculate_rsi(&self, prices: &VecDeque<f64>) -> f64 {
        if prices.len() < self.rsi_period + 1 {
            return 50.0;
        }
        let recent: Vec<f64> = prices.iter().rev().take(self.rsi_period + 1).copied().rev().collect();
        let mut gains = 0.0;
        let mut losses = 0.0;
        for w in recent.windows(2) {
            let change = w[1] - w[0];
            if change > 0.0 {
                gains += change;
            } else {
                losses -= change;
            }
        }
        let avg_gain = gains / self.rsi_period as f64;
        let avg_loss = losses / self.rsi_period as f64;
        if avg_loss == 0.0 {
            return 100.0;
        }
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }

    fn calculate_momentum(&self, prices: &VecDeque<f64>) -> f64 {
        if prices.len() < self.momentum_period {
            return 0.0;
        }
        let old_price = prices[prices.len() - self.momentum_period];
        if old_price == 0.0 {
            return 0.0;
        }
        let current = *prices.back().unwrap();
        (current - old_price) / old_price
    }

    fn calculate_trend_strength(&self, prices: &VecDeque<f64>) -> f64 {
        if prices.len() < 5 {
            return 0.0;
        }
        let n = prices.len() as f64;
        let xs: Vec<f64> = (0..prices.len()).map(|i| i as f64).collect();
        let ys: Vec<f64> = prices.iter().copied().collect();
        let x_mean = xs.iter().sum::<f64>() / n;
        let y_mean = ys.iter().sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for i in 0..prices.len() {
            let dx = xs[i] - x_mean;
            let dy = ys[i] - y_mean;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }
        if var_x == 0.0 || var_y == 0.0 {
            return 0.0;
        }
        let r = cov / (var_x.sqrt() * var_y.sqrt());
        r * r
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "RSI + momentum + trend-strength directional signal"
    }

    fn on_market_update(&mut self, snapshot: &MarketSnapshot, portfolio: &VirtualPortfolio) -> Vec<StrategySignal> {
        let buf = self
            .prices
            .entry(snapshot.market_id.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.rsi_period.max(self.momentum_period) * 2));
        buf.push_back(snapshot.yes_price);
        let cap = self.rsi_period.max(self.momentum_period) * 2;
        while buf.len() > cap {
            buf.pop_front();
        }

        let rsi = self.calculate_rsi(buf);
        let momentum = self.calculate_momentum(buf);
        let trend_strength = self.calculate_trend_strength(buf);

        let direction = if rsi > 50.0 && momentum > 0.0 {
            Direction::Bullish
        } else if rsi < 50.0 && momentum < 0.0 {
            Direction::Bearish
        } else {
            Direction::Neutral
        };

        let mut signals = Vec::new();
        let position = portfolio.get_position(&snapshot.market_id);
        let has_yes = position.map(|p| p.yes_shares > 0.0).unwrap_or(false);
        let has_no = position.map(|p| p.no_shares > 0.0).unwrap_or(false);

        if trend_strength >= self.min_trend_strength && direction != Direction::Neutral {
            match direction {
                Direction::Bullish => {
                    if momentum > self.entry_threshold && !has_yes && rsi < self.rsi_overbought {
                        signals.push(StrategySignal {
                            strategy: NAME.to_string(),
                            market_id: snapshot.market_id.clone(),
                            platform: snapshot.platform,
                            side: OrderSide::BuyYes,
                            size: self.max_position_per_market,
                            confidence: (trend_strength + momentum.abs()).min(1.0),
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
                }
                Direction::Bearish => {
                    if momentum < -self.entry_threshold && !has_no && rsi > self.rsi_oversold {
                        signals.push(StrategySignal {
                            strategy: NAME.to_string(),
                            market_id: snapshot.market_id.clone(),
                            platform: snapshot.platform,
                            side: OrderSide::BuyNo,
                            size: self.max_position_per_market,
                            confidence: (trend_strength + momentum.abs()).min(1.0),
                            target_price: None,
                            stop_loss: None,
                            take_profit: None,
                            metadata: HashMap::new(),
                        });
                    }
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
                }
                Direction::Neutral => {}
            }
        }

        // Momentum-reversal exits are checked every tick, independent of
        // the entry branch above.
        if has_yes && momentum < self.exit_threshold {
            signals.push(StrategySignal {
                strategy: NAME.to_string(),
                market_id: snapshot.market_id.clone(),
                platform: snapshot.platform,
                side: OrderSide::SellYes,
                size: position.unwrap().yes_shares,
                confidence: 0.7,
                target_price: None,
                stop_loss: None,
                take_profit: None,
                metadata: HashMap::new(),
            });
        }
        if has_no && momentum > -self.exit_threshold {
            signals.push(StrategySignal {
                strategy: NAME.to_string(),
                market_id: snapshot.market_id.clone(),
                platform: snapshot.platform,
                side: OrderSide::SellNo,
                size: position.unwrap().no_shares,
                confidence: 0.7,
                target_price: None,
                stop_loss: None,
                take_profit: None,
                metadata: HashMap::new(),
            });
        }

        signals
    }

    fn reset(&mut self) {
        self.prices.clear();
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
    fn rsi_defaults_to_50_before_enough_samples() {
        let strat = MomentumStrategy::new();
        let mut buf = VecDeque::new();
        buf.push_back(0.5);
        assert_eq!(strat.calculate_rsi(&buf), 50.0);
    }

    #[test]
    fn sustained_rally_triggers_buy_yes() {
        let mut strat = MomentumStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        let mut last_signals = Vec::new();
        let mut price = 0.40;
        for i in 0..30 {
            price += 0.01;
            last_signals = strat.on_market_update(&snap(price, i), &portfolio);
        }
        assert!(last_signals.iter().any(|s| s.side == OrderSide::BuyYes));
    }

    #[test]
    fn flat_prices_produce_no_signal() {
        let mut strat = MomentumStrategy::new();
        let portfolio = VirtualPortfolio::new(10_000.0);
        let mut signals = Vec::new();
        for i in 0..30 {
            signals = strat.on_market_update(&snap(0.5, i), &portfolio);
        }
        assert!(signals.is_empty());
    }
}
