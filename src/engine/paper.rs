//! Paper-trading engine: one or more live providers push events onto an
//! mpsc channel; a single dispatcher task applies them to the exchange
//! and portfolio in arrival order, exactly like the backtest engine's
//! per-order bookkeeping, while a sibling task records equity on a timer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};

use crate::exchange::SimulatedExchange;
use crate::portfolio::VirtualPortfolio;
use crate::report::BacktestResults;
use crate::strategies::{calculate_position_size, should_trade, RiskLimits, Strategy};
use crate::types::{MarketSnapshot, OrderSide, SimulationEvent};

/// Live data source for paper trading. `run` should push events onto
/// `tx` as they arrive in real wall-clock order and return once the
/// feed is exhausted or the channel closes.
#[async_trait]
pub trait DataProvider: Send {
    fn name(&self) -> &str;
    async fn run(&mut self, tx: mpsc::Sender<SimulationEvent>) -> Result<()>;
}

/// Wraps the synchronous `MockEventSource` as a push provider: generates
/// its full event list up front, then drips events onto the channel at
/// `tick_interval` apart, standing in for a live feed without any real
/// network collaborator. The only provider the `pb paper` subcommand runs.
pub struct MockProvider {
    source: crate::events::MockEventSource,
    tick_interval: StdDuration,
}

impl MockProvider {
    pub fn new(source: crate::events::MockEventSource, tick_interval: StdDuration) -> Self {
        Self { source, tick_interval }
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&mut self, tx: mpsc::Sender<SimulationEvent>) -> Result<()> {
        use crate::events::EventSource;
        let events = self.source.get_events()?;
        for event in events {
            if tx.send(event).await.is_err() {
                break;
            }
            tokio::time::sleep(self.tick_interval).await;
        }
        Ok(())
    }
}

pub struct PaperEngine {
    exchange: SimulatedExchange,
    portfolio: VirtualPortfolio,
    strategies: Vec<Box<dyn Strategy>>,
    risk: RiskLimits,
    record_equity_interval: StdDuration,
    stop_signal: Arc<Notify>,
}

impl PaperEngine {
    pub fn new(exchange: SimulatedExchange, initial_capital: f64, record_equity_interval_minutes: u32) -> Self {
        Self {
            exchange,
            portfolio: VirtualPortfolio::with_equity_interval(initial_capital, record_equity_interval_minutes),
            strategies: Vec::new(),
            risk: RiskLimits::default(),
            record_equity_interval: StdDuration::from_secs(record_equity_interval_minutes as u64 * 60),
            stop_signal: Arc::new(Notify::new()),
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

    /// A clone of this handle's stop signal, for a caller holding the
    /// engine elsewhere (e.g. a ctrl-c handler) to request shutdown.
    pub fn stop_handle(&self) -> Arc<Notify> {
        self.stop_signal.clone()
    }

    pub fn stop(&self) {
        self.stop_signal.notify_one();
    }

    /// Run until every provider exhausts its feed or `stop()` is called.
    /// Providers run as spawned tasks pushing into a shared mpsc channel;
    /// this task is the sole dispatcher mutating exchange/portfolio state.
    pub async fn run(&mut self, mut providers: Vec<Box<dyn DataProvider>>) -> Result<BacktestResults> {
        let (tx, mut rx) = mpsc::channel(1024);
        let mut handles = Vec::with_capacity(providers.len());
        for mut provider in providers.drain(..) {
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let name = provider.name().to_string();
                if let Err(e) = provider.run(tx).await {
                    tracing::warn!(provider = %name, error = %e, "data provider stopped with an error");
                }
            }));
        }
        drop(tx);

        let start = Utc::now();
        let mut total_orders = 0usize;
        let mut filled_orders = 0usize;
        let mut rejected_orders = 0usize;
        let mut total_fees = 0.0;
        let mut slippage_sum = 0.0;
        let mut slippage_count = 0usize;
        let mut by_strategy: HashMap<String, crate::report::Breakdown> = HashMap::new();
        let mut by_platform: HashMap<crate::types::Platform, crate::report::Breakdown> = HashMap::new();
        let mut daily_pnl_baseline = 0.0;
        let mut daily_pnl_day = Utc::now().ordinal();

        let mut equity_ticker = tokio::time::interval(self.record_equity_interval);
        equity_ticker.tick().await; // first tick fires immediately; consume it

        loop {
            tokio::select! {
                _ = self.stop_signal.notified() => {
                    info!("paper engine stop requested");
                    break;
                }
                maybe_event = rx.recv() => {
                    let Some(event) = maybe_event else {
                        info!("all data providers exhausted");
                        break;
                    };

                    let day = Utc::now().ordinal();
                    if daily_pnl_day != day {
                        daily_pnl_day = day;
                        daily_pnl_baseline = self.portfolio.get_realized_pnl();
                    }
                    let daily_pnl = self.portfolio.get_realized_pnl() - daily_pnl_baseline;

                    match event {
                        SimulationEvent::MarketUpdate { timestamp, market_id, platform, yes_price, no_price, volume, liquidity } => {
                            let snapshot = MarketSnapshot {
                                market_id: market_id.clone(),
                                platform,
                                timestamp,
                                question: String::new(),
                                yes_price,
                                no_price,
                                volume_24h: volume,
                                liquidity,
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
                                    let order = signal.to_order(order_id, timestamp);
                                    let result = self.exchange.submit_order(&order);

                                    if result.filled() {
                                        filled_orders += 1;
                                        total_fees += result.fees;
                                        slippage_sum += result.slippage;
                                        slippage_count += 1;

                                        let trade_id = uuid::Uuid::new_v4().to_string();
                                        self.portfolio.execute_trade(
                                            trade_id,
                                            &market_id,
                                            platform,
                                            order.side,
                                            result.filled_size,
                                            result.fill_price,
                                            result.fees,
                                            timestamp,
                                        );

                                        let b = by_strategy.entry(signal.strategy.clone()).or_default();
                                        b.trades += 1;
                                        b.volume += result.filled_size * result.fill_price;
                                        b.fees += result.fees;
                                        let b = by_platform.entry(platform).or_default();
                                        b.trades += 1;
                                        b.volume += result.filled_size * result.fill_price;
                                        b.fees += result.fees;
                                    } else {
                                        rejected_orders += 1;
                                        debug!(reason = ?result.reason, market_id = %market_id, "order rejected");
                                    }
                                }
                            }
                        }
                        SimulationEvent::OrderBookUpdate { book, .. } => {
                            self.exchange.update_book(book);
                        }
                        SimulationEvent::Resolution { timestamp, resolution } => {
                            self.portfolio.resolve_position(&resolution.market_id, resolution.outcome, &resolution.question, timestamp);
                            for strategy in &mut self.strategies {
                                strategy.on_resolution(&resolution);
                            }
                        }
                        SimulationEvent::News(_) => {}
                    }
                }
                _ = equity_ticker.tick() => {
                    let prices = self.exchange.current_prices();
                    self.portfolio.record_equity(Utc::now(), Some(&prices));
                }
            }
        }

        for handle in handles {
            handle.abort();
        }

        let end = Utc::now();
        let prices = self.exchange.current_prices();
        self.portfolio.record_equity(end, Some(&prices));

        let initial_capital = self.portfolio.equity_curve().first().map(|(_, eq)| *eq).unwrap_or_else(|| self.portfolio.cash());
        let final_value = self.portfolio.get_portfolio_value(Some(&self.exchange.current_prices()));
        let metrics = self.portfolio.get_metrics();
        let avg_slippage = if slippage_count > 0 { slippage_sum / slippage_count as f64 } else { 0.0 };

        Ok(BacktestResults {
            start,
            end,
            initial_capital,
            final_value,
            total_return: final_value - initial_capital,
            total_return_pct: if initial_capital > 0.0 { (final_value - initial_capital) / initial_capital } else { 0.0 },
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{BasicFillModel, FeeModel, LatencyModel};
    use crate::strategies::mean_reversion::MeanReversionStrategy;
    use crate::types::Platform;

    /// Replays a short, fixed sequence of events with a tiny delay between
    /// each send, standing in for a real push feed in tests.
    struct ScriptedProvider {
        events: Vec<SimulationEvent>,
    }

    #[async_trait]
    impl DataProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&mut self, tx: mpsc::Sender<SimulationEvent>) -> Result<()> {
            for event in self.events.drain(..) {
                if tx.send(event).await.is_err() {
                    break;
                }
                tokio::time::sleep(StdDuration::from_millis(1)).await;
            }
            Ok(())
        }
    }

    fn exchange() -> SimulatedExchange {
        SimulatedExchange::seeded(Box::new(BasicFillModel::default()), LatencyModel::default(), FeeModel::default(), Some(1))
    }

    #[tokio::test]
    async fn run_exhausts_provider_and_reports_results() {
        let mut engine = PaperEngine::new(exchange(), 10_000.0, 1);
        engine.add_strategy(Box::new(MeanReversionStrategy::new()));

        let now = Utc::now();
        let provider = ScriptedProvider {
            events: vec![
                SimulationEvent::MarketUpdate {
                    timestamp: now,
                    market_id: "m1".into(),
                    platform: Platform::Polymarket,
                    yes_price: 0.5,
                    no_price: 0.5,
                    volume: 0.0,
                    liquidity: 1000.0,
                },
                SimulationEvent::MarketUpdate {
                    timestamp: now,
                    market_id: "m1".into(),
                    platform: Platform::Polymarket,
                    yes_price: 0.52,
                    no_price: 0.48,
                    volume: 0.0,
                    liquidity: 1000.0,
                },
            ],
        };

        let results = engine.run(vec![Box::new(provider)]).await.unwrap();
        assert!(!results.equity_curve.is_empty());
    }

    #[tokio::test]
    async fn stop_signal_halts_a_long_running_provider() {
        struct NeverEndingProvider;

        #[async_trait]
        impl DataProvider for NeverEndingProvider {
            fn name(&self) -> &str {
                "never-ending"
            }

            async fn run(&mut self, tx: mpsc::Sender<SimulationEvent>) -> Result<()> {
                loop {
                    let event = SimulationEvent::MarketUpdate {
                        timestamp: Utc::now(),
                        market_id: "m1".into(),
                        platform: Platform::Polymarket,
                        yes_price: 0.5,
                        no_price: 0.5,
                        volume: 0.0,
                        liquidity: 1000.0,
                    };
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                    tokio::time::sleep(StdDuration::from_millis(1)).await;
                }
            }
        }

        let mut engine = PaperEngine::new(exchange(), 10_000.0, 1);
        engine.add_strategy(Box::new(MeanReversionStrategy::new()));
        let stop_handle = engine.stop_handle();

        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            stop_handle.notify_one();
        });

        let results = engine.run(vec![Box::new(NeverEndingProvider)]).await.unwrap();
        assert!(!results.equity_curve.is_empty());
    }
}
