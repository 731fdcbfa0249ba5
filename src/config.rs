//! YAML-loaded run configuration, mirroring the structure of the Python
//! configuration module this was adapted from field-for-field.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Platform;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FillModelConfig {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default = "default_prob_fill_on_limit")]
    pub prob_fill_on_limit: f64,
    #[serde(default = "default_prob_slippage")]
    pub prob_slippage: f64,
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: f64,
    #[serde(default = "default_price_impact_factor")]
    pub price_impact_factor: f64,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_model_type() -> String {
    "basic".to_string()
}
fn default_prob_fill_on_limit() -> f64 {
    0.8
}
fn default_prob_slippage() -> f64 {
    0.3
}
fn default_max_slippage_bps() -> f64 {
    50.0
}
fn default_price_impact_factor() -> f64 {
    0.1
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            model_type: default_model_type(),
            prob_fill_on_limit: default_prob_fill_on_limit(),
            prob_slippage: default_prob_slippage(),
            max_slippage_bps: default_max_slippage_bps(),
            price_impact_factor: default_price_impact_factor(),
            random_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatencyModelConfig {
    #[serde(default = "default_mean_ms")]
    pub mean_ms: f64,
    #[serde(default = "default_std_ms")]
    pub std_ms: f64,
    #[serde(default = "default_min_ms")]
    pub min_ms: f64,
    #[serde(default = "default_max_ms")]
    pub max_ms: f64,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_mean_ms() -> f64 {
    50.0
}
fn default_std_ms() -> f64 {
    20.0
}
fn default_min_ms() -> f64 {
    10.0
}
fn default_max_ms() -> f64 {
    500.0
}

impl Default for LatencyModelConfig {
    fn default() -> Self {
        Self {
            mean_ms: default_mean_ms(),
            std_ms: default_std_ms(),
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            random_seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeeModelConfig {
    #[serde(default = "default_true")]
    pub use_platform_fees: bool,
    #[serde(default)]
    pub custom_fee_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub fill_model: FillModelConfig,
    #[serde(default)]
    pub latency_model: LatencyModelConfig,
    #[serde(default)]
    pub fee_model: FeeModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskLimitsConfig {
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
}

fn default_max_position_size() -> f64 {
    500.0
}
fn default_max_daily_loss() -> f64 {
    200.0
}
fn default_max_open_positions() -> usize {
    10
}
fn default_max_position_pct() -> f64 {
    0.1
}

impl Default for RiskLimitsConfig {
    fn default() -> Self {
        Self {
            max_position_size: default_max_position_size(),
            max_daily_loss: default_max_daily_loss(),
            max_open_positions: default_max_open_positions(),
            max_position_pct: default_max_position_pct(),
            stop_loss_pct: None,
        }
    }
}

impl From<&RiskLimitsConfig> for crate::strategies::RiskLimits {
    fn from(c: &RiskLimitsConfig) -> Self {
        Self {
            max_position_size: c.max_position_size,
            max_daily_loss: c.max_daily_loss,
            max_open_positions: c.max_open_positions,
            max_position_pct: c.max_position_pct,
        }
    }
}

fn default_platforms() -> Vec<Platform> {
    vec![Platform::Polymarket, Platform::Kalshi]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_data_source")]
    pub data_source: String,
    #[serde(default)]
    pub data_path: Option<String>,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
    #[serde(default = "default_time_step_minutes")]
    pub time_step_minutes: i64,
    #[serde(default = "default_record_equity_interval")]
    pub record_equity_interval: u32,
}

fn default_initial_capital() -> f64 {
    10_000.0
}
fn default_data_source() -> String {
    "historical_db".to_string()
}
fn default_time_step_minutes() -> i64 {
    5
}
fn default_record_equity_interval() -> u32 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaperTradingConfig {
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default = "default_platforms")]
    pub platforms: Vec<Platform>,
    #[serde(default = "default_true")]
    pub real_time_data: bool,
    #[serde(default = "default_data_refresh_seconds")]
    pub data_refresh_seconds: u64,
    #[serde(default = "default_record_equity_interval")]
    pub record_equity_interval: u32,
}

fn default_data_refresh_seconds() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    Backtest,
    Paper,
}

/// Top-level run configuration, loaded from YAML via `from_yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub mode: SimulationMode,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub risk_limits: RiskLimitsConfig,
    #[serde(default)]
    pub backtest: Option<BacktestConfig>,
    #[serde(default)]
    pub paper: Option<PaperTradingConfig>,
    #[serde(default)]
    pub strategies: Vec<String>,
}

impl SimulationConfig {
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn get_initial_capital(&self) -> f64 {
        match self.mode {
            SimulationMode::Backtest => self.backtest.as_ref().map(|c| c.initial_capital).unwrap_or_else(default_initial_capital),
            SimulationMode::Paper => self.paper.as_ref().map(|c| c.initial_capital).unwrap_or_else(default_initial_capital),
        }
    }

    pub fn get_platforms(&self) -> Vec<Platform> {
        match self.mode {
            SimulationMode::Backtest => self.backtest.as_ref().map(|c| c.platforms.clone()).unwrap_or_else(default_platforms),
            SimulationMode::Paper => self.paper.as_ref().map(|c| c.platforms.clone()).unwrap_or_else(default_platforms),
        }
    }

    pub fn get_record_equity_interval(&self) -> u32 {
        match self.mode {
            SimulationMode::Backtest => self.backtest.as_ref().map(|c| c.record_equity_interval).unwrap_or_else(default_record_equity_interval),
            SimulationMode::Paper => self.paper.as_ref().map(|c| c.record_equity_interval).unwrap_or_else(default_record_equity_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_backtest_yaml() {
        let yaml = r#"
mode: backtest
backtest:
  start_date: "2024-01-01T00:00:00Z"
  end_date: "2024-02-01T00:00:00Z"
strategies:
  - mean_reversion
"#;
        let config: SimulationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mode, SimulationMode::Backtest);
        assert_eq!(config.get_initial_capital(), 10_000.0);
        assert_eq!(config.exchange.fill_model.model_type, "basic");
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let yaml = r#"
mode: backtest
backtest:
  start_date: "2024-01-01T00:00:00Z"
  end_date: "2024-02-01T00:00:00Z"
bogus_field: true
"#;
        let result: Result<SimulationConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn risk_limits_default_matches_original_config() {
        let risk = RiskLimitsConfig::default();
        assert_eq!(risk.max_position_size, 500.0);
        assert_eq!(risk.max_daily_loss, 200.0);
        assert_eq!(risk.max_open_positions, 10);
    }
}
