//! Virtual portfolio: cash + per-market dual-sided positions, trade and
//! resolution ledgers, the equity curve, and derived performance metrics.
//!
//! Single-writer: the engine is the only caller that mutates this type.
//! Strategies only ever read through `get_position`/`get_portfolio_value`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrderSide, Platform, Position, ResolutionOutcome};

/// A single executed fill, appended to the trade ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    pub market_id: String,
    pub platform: Platform,
    pub side: OrderSide,
    pub size: f64,
    pub price: f64,
    pub fees: f64,
    pub timestamp: DateTime<Utc>,
}

/// A settled resolution, appended to the resolution ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub market_id: String,
    pub platform: Platform,
    pub outcome: ResolutionOutcome,
    pub question: String,
    pub pnl: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown: f64,
    pub calmar_ratio: f64,
    pub annualized_return: f64,
    pub total_trades: usize,
    pub resolved_markets: usize,
    pub realized_pnl: f64,
}

/// Cash + positions + ledgers + equity curve for one simulation run.
pub struct VirtualPortfolio {
    initial_capital: f64,
    cash: f64,
    positions: HashMap<String, Position>,
    trades: Vec<TradeRecord>,
    resolutions: Vec<ResolutionRecord>,
    equity_curve: Vec<(DateTime<Utc>, f64)>,
    peak_equity: f64,
    max_drawdown_pct: f64,
    /// Derived from `record_equity_interval` (see §4.3's resolved open
    /// question): periods-per-year used to annualise Sharpe/Sortino.
    periods_per_year: f64,
}

impl VirtualPortfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self::with_equity_interval(initial_capital, 1440)
    }

    /// `record_equity_interval_minutes` drives the Sharpe/Sortino
    /// annualisation factor: `periods_per_year = (365.25*24*60) /
    /// interval_minutes`.
    pub fn with_equity_interval(initial_capital: f64, record_equity_interval_minutes: u32) -> Self {
        let interval = record_equity_interval_minutes.max(1) as f64;
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            trades: Vec::new(),
            resolutions: Vec::new(),
            equity_curve: Vec::new(),
            peak_equity: initial_capital,
            max_drawdown_pct: 0.0,
            periods_per_year: (365.25 * 24.0 * 60.0) / interval,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn get_position(&self, market_id: &str) -> Option<&Position> {
        self.positions.get(market_id)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn resolutions(&self) -> &[ResolutionRecord] {
        &self.resolutions
    }

    pub fn equity_curve(&self) -> &[(DateTime<Utc>, f64)] {
        &self.equity_curve
    }

    /// Attempt to execute a fill against the ledger. Returns `false` (no
    /// mutation) if a buy cannot be funded.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_trade(
        &mut self,
        trade_id: String,
        market_id: &str,
        platform: Platform,
        side: OrderSide,
        size: f64,
        price: f64,
        fees: f64,
        timestamp: DateTime<Utc>,
    ) -> bool {
        debug_assert!(size > 0.0);
        debug_assert!((0.0..=1.0).contains(&price));

        if side.is_buy() {
            let cost = size * price + fees;
            if self.cash < cost {
                return false;
            }
            self.cash -= cost;
        } else {
            let proceeds = size * price - fees;
            self.cash += proceeds;
        }

        let position = self
            .positions
            .entry(market_id.to_string())
            .or_insert_with(|| Position::new(market_id.to_string(), platform, timestamp));

        match side {
            OrderSide::BuyYes => {
                let new_avg = (position.yes_shares * position.yes_avg_price + size * price)
                    / (position.yes_shares + size);
                position.yes_avg_price = new_avg;
                position.yes_cost_basis += size * price + fees;
                position.yes_shares += size;
            }
            OrderSide::BuyNo => {
                let new_avg = (position.no_shares * position.no_avg_price + size * price)
                    / (position.no_shares + size);
                position.no_avg_price = new_avg;
                position.no_cost_basis += size * price + fees;
                position.no_shares += size;
            }
            OrderSide::SellYes => {
                let shares_after = (position.yes_shares - size).max(0.0);
                let ratio = size / (shares_after + size);
                position.yes_cost_basis -= position.yes_cost_basis * ratio;
                position.yes_shares = shares_after;
            }
            OrderSide::SellNo => {
                let shares_after = (position.no_shares - size).max(0.0);
                let ratio = size / (shares_after + size);
                position.no_cost_basis -= position.no_cost_basis * ratio;
                position.no_shares = shares_after;
            }
        }
        position.last_updated = timestamp;

        self.trades.push(TradeRecord {
            trade_id,
            market_id: market_id.to_string(),
            platform,
            side,
            size,
            price,
            fees,
            timestamp,
        });

        if position.is_flat() {
            self.positions.remove(market_id);
        }

        true
    }

    /// Settle a resolution. No-op (returns 0) if the market is untracked.
    pub fn resolve_position(
        &mut self,
        market_id: &str,
        outcome: ResolutionOutcome,
        question: &str,
        timestamp: DateTime<Utc>,
    ) -> f64 {
        let Some(position) = self.positions.remove(market_id) else {
            return 0.0;
        };

        let total_cost_basis = position.total_cost_basis();
        let payout = match outcome {
            ResolutionOutcome::Yes => position.yes_shares,
            ResolutionOutcome::No => position.no_shares,
            ResolutionOutcome::Cancelled => total_cost_basis,
            ResolutionOutcome::Ambiguous => 0.0,
        };
        self.cash += payout;
        let pnl = payout - total_cost_basis;

        self.resolutions.push(ResolutionRecord {
            market_id: market_id.to_string(),
            platform: position.platform,
            outcome,
            question: question.to_string(),
            pnl,
            timestamp,
        });

        pnl
    }

    /// `cash + sum(position market value)`, marking each position at
    /// `current_prices[market_id]` or its own `yes_avg_price` as fallback.
    pub fn get_portfolio_value(&self, current_prices: Option<&HashMap<String, f64>>) -> f64 {
        let positions_value: f64 = self
            .positions
            .values()
            .map(|p| {
                let price = current_prices
                    .and_then(|m| m.get(&p.market_id))
                    .copied()
                    .unwrap_or(p.yes_avg_price);
                p.market_value(price)
            })
            .sum();
        self.cash + positions_value
    }

    pub fn get_unrealized_pnl(&self, current_prices: Option<&HashMap<String, f64>>) -> f64 {
        self.positions
            .values()
            .map(|p| {
                let price = current_prices
                    .and_then(|m| m.get(&p.market_id))
                    .copied()
                    .unwrap_or(p.yes_avg_price);
                p.market_value(price) - p.total_cost_basis()
            })
            .sum()
    }

    pub fn get_realized_pnl(&self) -> f64 {
        self.resolutions.iter().map(|r| r.pnl).sum()
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, current_prices: Option<&HashMap<String, f64>>) {
        let equity = self.get_portfolio_value(current_prices);
        self.equity_curve.push((timestamp, equity));
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }
    }

    /// Period returns `r_i = (eq_i - eq_{i-1}) / eq_{i-1}`. A period whose
    /// previous reading is `<= 0` is skipped, not zero-padded.
    fn period_returns(&self) -> Vec<f64> {
        self.equity_curve
            .windows(2)
            .filter_map(|w| {
                let prev = w[0].1;
                let cur = w[1].1;
                if prev > 0.0 {
                    Some((cur - prev) / prev)
                } else {
                    None
                }
            })
            .collect()
    }

    pub fn get_metrics(&self) -> PortfolioMetrics {
        let resolved_markets = self.resolutions.len();
        let wins: Vec<f64> = self
            .resolutions
            .iter()
            .map(|r| r.pnl)
            .filter(|&pnl| pnl > 0.0)
            .collect();
        let losses: Vec<f64> = self
            .resolutions
            .iter()
            .map(|r| r.pnl)
            .filter(|&pnl| pnl < 0.0)
            .collect();

        let win_rate = if resolved_markets > 0 {
            wins.len() as f64 / resolved_markets as f64
        } else {
            0.0
        };
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses).abs();
        let sum_wins: f64 = wins.iter().sum();
        let sum_losses: f64 = losses.iter().sum::<f64>().abs();
        let profit_factor = if sum_losses > 0.0 { sum_wins / sum_losses } else { 0.0 };
        let expectancy = win_rate * avg_win - (1.0 - win_rate) * avg_loss;

        let returns = self.period_returns();
        let mean_r = mean(&returns);
        let std_r = stdev(&returns);
        let sharpe = if std_r > 0.0 {
            mean_r / std_r * self.periods_per_year.sqrt()
        } else {
            0.0
        };
        let negative_returns: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        let downside_std = stdev(&negative_returns);
        let sortino = if downside_std > 0.0 {
            mean_r / downside_std * self.periods_per_year.sqrt()
        } else {
            0.0
        };

        let max_drawdown = self.max_drawdown_pct * self.peak_equity;

        let last_equity = self
            .equity_curve
            .last()
            .map(|(_, eq)| *eq)
            .unwrap_or(self.cash);
        let total_return_pct = if self.initial_capital > 0.0 {
            (last_equity - self.initial_capital) / self.initial_capital
        } else {
            0.0
        };
        let calmar = if self.max_drawdown_pct > 0.0 {
            total_return_pct / self.max_drawdown_pct
        } else {
            0.0
        };

        let annualized_return = match (self.equity_curve.first(), self.equity_curve.last()) {
            (Some((t0, _)), Some((t1, _))) if t1 > t0 => {
                let days = (*t1 - *t0).num_milliseconds() as f64 / 86_400_000.0;
                if days > 0.0 {
                    (1.0 + total_return_pct).powf(365.25 / days) - 1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        PortfolioMetrics {
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
            expectancy,
            sharpe_ratio: sharpe,
            sortino_ratio: sortino,
            max_drawdown_pct: self.max_drawdown_pct,
            max_drawdown,
            calmar_ratio: calmar,
            annualized_return,
            total_trades: self.trades.len(),
            resolved_markets,
            realized_pnl: self.get_realized_pnl(),
        }
    }

    pub fn reset(&mut self) {
        self.cash = self.initial_capital;
        self.positions.clear();
        self.trades.clear();
        self.resolutions.clear();
        self.equity_curve.clear();
        self.peak_equity = self.initial_capital;
        self.max_drawdown_pct = 0.0;
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn stdev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    variance.sqrt()
}
