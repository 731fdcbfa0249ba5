//! Recoverable error taxonomy for the exchange/portfolio boundary.
//!
//! These never propagate as `Result::Err` out of the engine loop -- they
//! are carried as data in `FillResult.reason` or as a `bool` return from
//! `execute_trade`. Fatal setup failures (bad config, missing data file)
//! use `anyhow::Error` instead, surfaced only at the CLI boundary.

use thiserror::Error;

/// Reject reasons a `FillResult` can carry. `Display` renders the exact
/// lowercase tag used throughout the config/report surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FillRejectReason {
    #[error("invalid_order")]
    InvalidOrder,
    #[error("market_not_found")]
    MarketNotFound,
    #[error("no_liquidity")]
    NoLiquidity,
    #[error("empty_order_book")]
    EmptyOrderBook,
    #[error("no_fills_at_limit")]
    NoFillsAtLimit,
    #[error("price_above_limit")]
    PriceAboveLimit,
    #[error("price_below_limit")]
    PriceBelowLimit,
}
