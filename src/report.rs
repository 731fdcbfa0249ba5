//! The artefact produced by a completed run: summary PnL, metrics, and
//! per-strategy / per-platform trade breakdowns.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::portfolio::{PortfolioMetrics, ResolutionRecord, TradeRecord};
use crate::types::Platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Breakdown {
    pub trades: usize,
    pub volume: f64,
    pub fees: f64,
}

/// Everything a finished backtest or paper-trading run reports.
#[derive(Debug, Clone)]
pub struct BacktestResults {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub metrics: PortfolioMetrics,
    pub trades: Vec<TradeRecord>,
    pub resolutions: Vec<ResolutionRecord>,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub by_strategy: HashMap<String, Breakdown>,
    pub by_platform: HashMap<Platform, Breakdown>,
    pub total_orders: usize,
    pub filled_orders: usize,
    pub rejected_orders: usize,
    pub total_fees: f64,
    pub avg_slippage: f64,
}

impl BacktestResults {
    /// Record one order's outcome into the per-strategy/per-platform
    /// breakdowns. Call only for fills -- rejects don't touch these maps.
    pub fn record_fill(&mut self, strategy: &str, platform: Platform, filled_size: f64, fill_price: f64, fees: f64) {
        let by_strategy = self.by_strategy.entry(strategy.to_string()).or_default();
        by_strategy.trades += 1;
        by_strategy.volume += filled_size * fill_price;
        by_strategy.fees += fees;

        let by_platform = self.by_platform.entry(platform).or_default();
        by_platform.trades += 1;
        by_platform.volume += filled_size * fill_price;
        by_platform.fees += fees;
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "=".repeat(55));
        println!("  predictbot-core run summary");
        println!("{}", "=".repeat(55));
        println!();
        println!("  Period:          {} -> {}", self.start, self.end);
        println!("  Initial capital: {:.2}", self.initial_capital);
        println!("  Final value:     {:.2}", self.final_value);
        println!(
            "  Total return:    {:+.2}   ({:+.2}%)",
            self.total_return,
            self.total_return_pct * 100.0
        );
        println!();
        println!("  --- Orders {}", "-".repeat(43));
        println!("  Submitted:   {}", self.total_orders);
        println!("  Filled:      {}", self.filled_orders);
        println!("  Rejected:    {}", self.rejected_orders);
        println!("  Total fees:  {:.2}", self.total_fees);
        println!("  Avg slippage: {:.4}", self.avg_slippage);
        println!();
        println!("  --- Metrics {}", "-".repeat(42));
        println!("  Win rate:        {:.1}%", self.metrics.win_rate * 100.0);
        println!("  Profit factor:   {:.2}", self.metrics.profit_factor);
        println!("  Expectancy:      {:+.2}", self.metrics.expectancy);
        println!("  Sharpe ratio:    {:.2}", self.metrics.sharpe_ratio);
        println!("  Sortino ratio:   {:.2}", self.metrics.sortino_ratio);
        println!("  Max drawdown:    {:.2} ({:.1}%)", self.metrics.max_drawdown, self.metrics.max_drawdown_pct * 100.0);
        println!("  Calmar ratio:    {:.2}", self.metrics.calmar_ratio);
        println!("  Annualized ret:  {:+.1}%", self.metrics.annualized_return * 100.0);
        println!();
        println!("  --- By strategy {}", "-".repeat(38));
        for (name, b) in &self.by_strategy {
            println!("  {:<20} trades={:<6} volume={:>10.2} fees={:>8.2}", name, b.trades, b.volume, b.fees);
        }
        println!();
        println!("  --- By platform {}", "-".repeat(38));
        for (platform, b) in &self.by_platform {
            println!("  {:<20} trades={:<6} volume={:>10.2} fees={:>8.2}", platform.as_str(), b.trades, b.volume, b.fees);
        }
        println!();
        println!("{}", "=".repeat(55));
        println!();
    }

    /// Export the trade ledger to CSV.
    pub fn export_trades_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create CSV at {}", path.display()))?;
        for t in &self.trades {
            wtr.serialize(t).with_context(|| format!("failed to write trade row for {}", t.trade_id))?;
        }
        wtr.flush().context("failed to flush CSV")?;
        Ok(())
    }

    /// Export the equity curve to CSV (`timestamp,equity`).
    pub fn export_equity_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create CSV at {}", path.display()))?;
        wtr.write_record(["timestamp", "equity"])?;
        for (t, eq) in &self.equity_curve {
            wtr.write_record([t.to_rfc3339(), format!("{eq:.6}")])?;
        }
        wtr.flush().context("failed to flush CSV")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::VirtualPortfolio;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn empty_results() -> BacktestResults {
        let pf = VirtualPortfolio::new(10_000.0);
        BacktestResults {
            start: ts(),
            end: ts(),
            initial_capital: 10_000.0,
            final_value: 10_000.0,
            total_return: 0.0,
            total_return_pct: 0.0,
            metrics: pf.get_metrics(),
            trades: Vec::new(),
            resolutions: Vec::new(),
            equity_curve: Vec::new(),
            by_strategy: HashMap::new(),
            by_platform: HashMap::new(),
            total_orders: 0,
            filled_orders: 0,
            rejected_orders: 0,
            total_fees: 0.0,
            avg_slippage: 0.0,
        }
    }

    #[test]
    fn record_fill_updates_both_breakdowns() {
        let mut results = empty_results();
        results.record_fill("momentum", Platform::Polymarket, 10.0, 0.5, 1.0);
        assert_eq!(results.by_strategy["momentum"].trades, 1);
        assert_eq!(results.by_platform[&Platform::Polymarket].trades, 1);
        assert!((results.by_strategy["momentum"].volume - 5.0).abs() < 1e-9);
    }

    #[test]
    fn print_summary_does_not_panic() {
        let results = empty_results();
        results.print_summary();
    }

    #[test]
    fn export_equity_csv_round_trips() {
        let mut results = empty_results();
        results.equity_curve.push((ts(), 10_000.0));
        let dir = std::env::temp_dir().join("predictbot_core_test_csv");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("equity.csv");
        results.export_equity_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("equity"));
        let _ = std::fs::remove_file(&path);
    }
}
