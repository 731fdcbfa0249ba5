//! Synchronous, deterministic backtest engine: replays an `EventSource`
//! against a `SimulatedExchange` and `VirtualPortfolio`, dispatching each
//! tick to every configured strategy in turn.

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};

use crate::events::EventSource;
use crate::exchange::SimulatedExchange;
use crate::portfolio::VirtualPortfolio;
use crate::report::BacktestResults;
use crate::strategies::{calculate_position_size, should_trade, RiskLimits, Strategy};
use crate::types::{MarketSnapshot, OrderSide, ResolutionOutcome, SimulationEvent};

const PROGRESS_LOG_INTERVAL: usize = 10_000;

pub struct BacktestEngine {
    exchange: SimulatedExchange,
    portfolio: VirtualPortfolio,
    strategies: Vec<Box<dyn Strategy>>,
    risk: RiskLimits,
    record_equity_interval_minutes: i64,
}

impl BacktestEngine {
    pub fn new(exchange: SimulatedExchange, initial_capital: f64, record_equity_interval_minutes: u32) -> Self {
        Self {
            exchange,
            portfolio: VirtualPortfolio::with_equity_interval(initial_capital, record_equity_interval_minutes),
            strategies: Vec::new(),
            risk: RiskLimits::default(),
            record_equity_interval_minutes: record_equity_interval_minutes as i64,
        }
    }

    pub fn with_risk_limits(mut self, risk: RiskLimits) -> Self {
        self.risk = risk;
        self
    }

    pub fn add_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    pub fn portfolio(&self) -> &VirtualPortfolio {
        &self.portfolio
    }

    /// Replay every event from `source` in order. Requires at least one
    /// strategy to have been registered.
    pub fn run(&mut self, source: &mut dyn EventSource) -> Result<BacktestResults> {
        if self.strategies.is_empty() {
            bail!("backtest requires at least one strategy");
        }

        let events = source.get_events()?;
        let Some(first) = events.first() else {
            bail!("event source produced no events");
        };
        let start = first.timestamp();
        let end = events.last().map(|e| e.timestamp()).unwrap_or(start);

        let mut total_orders = 0usize;
        let mut filled_orders = 0usize;
        let mut rejected_orders = 0usize;
        let mut total_fees = 0.0;
        let mut slippage_sum = 0.0;
        let mut slippage_count = 0usize;
        let mut by_strategy: HashMap<String, crate::report::Breakdown> = HashMap::new();
        let mut by_platform: HashMap<crate::types::Platform, crate::report::Breakdown> = HashMap::new();

        let mut last_equity_record: Option<DateTime<Utc>> = None;
        let mut daily_pnl_day: Option<u32> = None;
        let mut daily_pnl_baseline = 0.0;

        for (i, event) in events.iter().enumerate() {
            if i > 0 && i % PROGRESS_LOG_INTERVAL == 0 {
                info!(processed = i, total = events.len(), "backtest progress");
            }

            let day = event.timestamp().ordinal();
            if daily_pnl_day != Some(day) {
                daily_pnl_day = Some(day);
                daily_pnl_baseline = self.portfolio.get_realized_pnl();
            }
            let daily_pnl = self.portfolio.get_realized_pnl() - daily_pnl_baseline;

            match event {
                SimulationEvent::MarketUpdate { timestamp, market_id, platform, yes_price, no_price, volume, liquidity } => {
                    let snapshot = MarketSnapshot {
                        market_id: market_id.clone(),
                        platform: *platform,
                        timestamp: *timestamp,
                        question: String::new(),
                        yes_price: *yes_price,
                        no_price: *no_price,
                        volume_24h: *volume,
                        liquidity: *liquidity,
                        resolution_date: None,
                        status: crate::types::MarketStatus::Active,
                        tags: Vec::new(),
                        metadata: Default::default(),
                    };
                    self.exchange.update_snapshot(snapshot.clone());

                    for idx in 0..self.strategies.len() {
                        let strategy_name = self.strategies[idx].name().to_string();
                        let strategy = &mut self.strategies[idx];
                        let portfolio = &self.portfolio;
                        let signals = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            strategy.on_market_update(&snapshot, portfolio)
                        })) {
                            Ok(signals) => signals,
                            Err(_) => {
                                tracing::error!(strategy = %strategy_name, "strategy panicked, skipping this tick");
                                Vec::new()
                            }
                        };
                        for signal in signals {
                            let portfolio_value = self.portfolio.get_portfolio_value(None);
                            let is_exit = matches!(signal.side, OrderSide::SellYes | OrderSide::SellNo);
                            if !is_exit && !should_trade(&self.risk, &self.portfolio, daily_pnl) {
                                continue;
                            }
                            let size = if is_exit {
                                signal.size
                            } else {
                                calculate_position_size(&self.risk, portfolio_value, signal.size)
                            };
                            if size <= 0.0 {
                                continue;
                            }
                            let mut signal = signal;
                            signal.size = size;

                            total_orders += 1;
                            let order_id = uuid::Uuid::new_v4().to_string();
                            let order = signal.to_order(order_id, *timestamp);
                            let result = self.exchange.submit_order(&order);

                            if result.filled() {
                                filled_orders += 1;
                                total_fees += result.fees;
                                slippage_sum += result.slippage;
                                slippage_count += 1;

                                let trade_id = uuid::Uuid::new_v4().to_string();
                                self.portfolio.execute_trade(
                                    trade_id,
                                    market_id,
                                    *platform,
                                    order.side,
                                    result.filled_size,
                                    result.fill_price,
                                    result.fees,
                                    *timestamp,
                                );

                                let strategy_name = signal.strategy.clone();
                                let b = by_strategy.entry(strategy_name).or_default();
                                b.trades += 1;
                                b.volume += result.filled_size * result.fill_price;
                                b.fees += result.fees;
                                let b = by_platform.entry(*platform).or_default();
                                b.trades += 1;
                                b.volume += result.filled_size * result.fill_price;
                                b.fees += result.fees;
                            } else {
                                rejected_orders += 1;
                                debug!(reason = ?result.reason, market_id, "order rejected");
                            }
                        }
                    }
                }
                SimulationEvent::OrderBookUpdate { book, .. } => {
                    self.exchange.update_book(book.clone());
                }
                SimulationEvent::Resolution { timestamp, resolution } => {
                    self.portfolio.resolve_position(&resolution.market_id, resolution.outcome, &resolution.question, *timestamp);
                    for strategy in &mut self.strategies {
                        strategy.on_resolution(resolution);
                    }
                    debug!(market_id = %resolution.market_id, outcome = ?resolution.outcome, "market resolved");
                    if resolution.outcome == ResolutionOutcome::Ambiguous {
                        warn!(market_id = %resolution.market_id, "ambiguous resolution settled with zero payout");
                    }
                }
                SimulationEvent::News(_) => {
                    // No built-in strategy acts on news; dispatched and dropped.
                }
            }

            let timestamp = event.timestamp();
            let should_record = match last_equity_record {
                None => true,
                Some(last) => (timestamp - last).num_minutes() >= self.record_equity_interval_minutes,
            };
            if should_record {
                let prices = self.exchange.current_prices();
                self.portfolio.record_equity(timestamp, Some(&prices));
                last_equity_record = Some(timestamp);
            }
        }

        let prices = self.exchange.current_prices();
        self.portfolio.record_equity(end, Some(&prices));

        let final_value = self.portfolio.get_portfolio_value(Some(&self.exchange.current_prices()));
        let initial_capital = self.initial_capital_value();
        let metrics = self.portfolio.get_metrics();

        let avg_slippage = if slippage_count > 0 { slippage_sum / slippage_count as f64 } else { 0.0 };

        Ok(BacktestResults {
            start,
            end,
            initial_capital,
            final_value,
            total_return: final_value - initial_capital,
            total_return_pct: if initial_capital > 0.0 {
                (final_value - initial_capital) / initial_capital
            } else {
                0.0
            },
            metrics,
            trades: self.portfolio.trades().to_vec(),
            resolutions: self.portfolio.resolutions().to_vec(),
            equity_curve: self.portfolio.equity_curve().to_vec(),
            by_strategy,
            by_platform,
            total_orders,
            filled_orders,
            rejected_orders,
            total_fees,
            avg_slippage,
        })
    }

    fn initial_capital_value(&self) -> f64 {
        self.portfolio.equity_curve().first().map(|(_, eq)| *eq).unwrap_or_else(|| self.portfolio.cash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BasicFillModel, FeeModel, LatencyModel};
    use crate::strategies::mean_reversion::MeanReversionStrategy;
    use rand_chacha::ChaCha8Rng;
    use rand::SeedableRng;

    fn exchange() -> SimulatedExchange {
        SimulatedExchange::seeded(Box::new(BasicFillModel::default()), LatencyModel::default(), FeeModel::default(), Some(1))
    }

    #[test]
    fn run_requires_at_least_one_strategy() {
        let mut engine = BacktestEngine::new(exchange(), 10_000.0, 60);
        let mut source = crate::events::MockEventSource::new(1, vec![crate::types::Platform::Polymarket], 60, Utc::now(), ChaCha8Rng::seed_from_u64(1));
        let result = engine.run(&mut source);
        assert!(result.is_err());
    }

    #[test]
    fn run_completes_and_reports_equity_curve() {
        let mut engine = BacktestEngine::new(exchange(), 10_000.0, 60);
        engine.add_strategy(Box::new(MeanReversionStrategy::new()));
        let mut source = crate::events::MockEventSource::new(
            2,
            vec![crate::types::Platform::Polymarket, crate::types::Platform::Kalshi],
            60,
            Utc::now(),
            ChaCha8Rng::seed_from_u64(7),
        );
        let results = engine.run(&mut source).unwrap();
        assert!(!results.equity_curve.is_empty());
        assert_eq!(results.resolutions.len(), 2);
    }
}
