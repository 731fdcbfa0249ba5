pub mod arbitrage;
pub mod market_maker;
pub mod mean_reversion;
pub mod momentum;
pub mod spike_detector;

use crate::portfolio::VirtualPortfolio;
use crate::types::{MarketResolution, MarketSnapshot, StrategySignal};

/// Trait for trading strategies.
///
/// Strategies observe market snapshots and the current portfolio state,
/// and emit `StrategySignal`s. They are stateful: `on_market_update` runs
/// on every snapshot for every tracked market, `on_resolution` notifies
/// of a settled market, and `reset` clears internal history between runs.
pub trait Strategy: Send {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    fn on_market_update(&mut self, snapshot: &MarketSnapshot, portfolio: &VirtualPortfolio) -> Vec<StrategySignal>;

    /// Called once per settled market. Default is a no-op; strategies that
    /// key internal state off a market (cooldowns, registered questions)
    /// override this to drop it.
    fn on_resolution(&mut self, _resolution: &MarketResolution) {}

    fn reset(&mut self);
}

/// Risk limits shared by every strategy's entry gating, loaded from
/// `RiskLimitsConfig` in practice.
#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub max_position_size: f64,
    pub max_daily_loss: f64,
    pub max_open_positions: usize,
    pub max_position_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 500.0,
            max_daily_loss: 200.0,
            max_open_positions: 10,
            max_position_pct: 0.1,
        }
    }
}

/// Gate: refuse new entries once too many markets are open or the day's
/// realised loss has breached the cap. Exits are never gated by this --
/// callers should only consult it before opening/adding to a position.
pub fn should_trade(risk: &RiskLimits, portfolio: &VirtualPortfolio, daily_pnl: f64) -> bool {
    if portfolio.open_position_count() >= risk.max_open_positions {
        return false;
    }
    if daily_pnl <= -risk.max_daily_loss {
        return false;
    }
    true
}

/// Caps a desired order size at the smaller of the flat per-market limit
/// and a fraction of current portfolio value.
pub fn calculate_position_size(risk: &RiskLimits, portfolio_value: f64, desired_size: f64) -> f64 {
    let pct_cap = portfolio_value * risk.max_position_pct;
    let cap = risk.max_position_size.min(pct_cap.max(0.0));
    desired_size.min(cap).max(0.0)
}

/// Create a strategy by name with default parameters.
pub fn create_strategy(name: &str) -> Option<Box<dyn Strategy>> {
    match name {
        "mean_reversion" => Some(Box::new(mean_reversion::MeanReversionStrategy::new())),
        "momentum" => Some(Box::new(momentum::MomentumStrategy::new())),
        "spike_detector" => Some(Box::new(spike_detector::SpikeDetectorStrategy::new())),
        "arbitrage" => Some(Box::new(arbitrage::ArbitrageStrategy::new())),
        "market_maker" => Some(Box::new(market_maker::MarketMakerStrategy::new())),
        _ => None,
    }
}

/// List all available strategy names and descriptions.
pub fn list_strategies() -> Vec<(&'static str, &'static str)> {
    vec![
        ("mean_reversion", "Z-score/Bollinger band mean reversion with a fixed hold period"),
        ("momentum", "RSI + momentum + trend-strength directional signal"),
        ("spike_detector", "Price-change and volume-surge spike detection with a cooldown"),
        ("arbitrage", "Cross-platform arbitrage on matching questions"),
        ("market_maker", "EMA fair-value two-sided quoting with inventory skew"),
    ]
}

pub fn is_known_strategy(name: &str) -> bool {
    list_strategies().iter().any(|(n, _)| *n == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_limits_block_once_open_position_cap_reached() {
        let risk = RiskLimits { max_open_positions: 0, ..RiskLimits::default() };
        let portfolio = VirtualPortfolio::new(10_000.0);
        assert!(!should_trade(&risk, &portfolio, 0.0));
    }

    #[test]
    fn risk_limits_block_on_daily_loss_breach() {
        let risk = RiskLimits::default();
        let portfolio = VirtualPortfolio::new(10_000.0);
        assert!(!should_trade(&risk, &portfolio, -250.0));
        assert!(should_trade(&risk, &portfolio, -50.0));
    }

    #[test]
    fn position_size_caps_at_flat_limit() {
        let risk = RiskLimits::default();
        let size = calculate_position_size(&risk, 1_000_000.0, 10_000.0);
        assert_eq!(size, 500.0);
    }

    #[test]
    fn position_size_caps_at_pct_of_small_portfolio() {
        let risk = RiskLimits::default();
        let size = calculate_position_size(&risk, 1_000.0, 10_000.0);
        assert_eq!(size, 100.0);
    }

    #[test]
    fn known_strategy_names_are_creatable() {
        for (name, _) in list_strategies() {
            assert!(is_known_strategy(name));
            assert!(create_strategy(name).is_some());
        }
        assert!(create_strategy("nonexistent").is_none());
    }
}
