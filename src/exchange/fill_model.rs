//! Fill simulation: turns a validated `Order` plus current market state
//! into a `FillResult`. Two implementations mirror the two fill
//! strategies used during research -- a cheap probabilistic model for
//! fast iteration, and an order-book walk for realistic slippage.

use rand::Rng;

use crate::error::FillRejectReason;
use crate::types::{FillResult, FillStatus, MarketSnapshot, Order, OrderBookSnapshot, OrderSide, OrderType};

/// Reference (mid-ish) price an order is evaluated against: `yes_price`
/// for YES-side orders, `no_price` for NO-side orders.
fn reference_price(snapshot: &MarketSnapshot, side: OrderSide) -> f64 {
    if side.is_yes() {
        snapshot.yes_price
    } else {
        snapshot.no_price
    }
}

/// Implementors decide whether/how an order fills against current market
/// state. `Send` because the exchange is owned by a single engine task
/// but may be swapped across backtest/paper modes.
pub trait FillModel: Send {
    fn name(&self) -> &str;

    fn simulate_fill(
        &self,
        order: &Order,
        snapshot: &MarketSnapshot,
        book: Option<&OrderBookSnapshot>,
        liquidity: f64,
        rng: &mut dyn rand::RngCore,
    ) -> FillResult;
}

/// Probabilistic fill model: crosses-the-market orders fill with a fixed
/// probability and an independent, probabilistic slippage kick. Ignores
/// the order book entirely -- intended for fast backtests over a
/// mid-price-only data feed.
pub struct BasicFillModel {
    pub prob_fill_on_limit: f64,
    pub prob_slippage: f64,
    pub max_slippage_bps: f64,
}

impl Default for BasicFillModel {
    fn default() -> Self {
        Self {
            prob_fill_on_limit: 0.8,
            prob_slippage: 0.3,
            max_slippage_bps: 50.0,
        }
    }
}

impl FillModel for BasicFillModel {
    fn name(&self) -> &str {
        "basic"
    }

    fn simulate_fill(
        &self,
        order: &Order,
        snapshot: &MarketSnapshot,
        _book: Option<&OrderBookSnapshot>,
        liquidity: f64,
        rng: &mut dyn rand::RngCore,
    ) -> FillResult {
        if !order.validate() {
            return FillResult::rejected(FillRejectReason::InvalidOrder.to_string());
        }
        if liquidity <= 0.0 {
            return FillResult::rejected(FillRejectReason::NoLiquidity.to_string());
        }

        let reference = reference_price(snapshot, order.side);
        let is_buy = order.side.is_buy();

        if order.order_type == OrderType::Limit {
            let limit = order.limit_price.expect("validated limit order carries a price");
            let crosses = if is_buy { limit >= reference } else { limit <= reference };
            if !crosses {
                let reason = if is_buy {
                    FillRejectReason::PriceBelowLimit
                } else {
                    FillRejectReason::PriceAboveLimit
                };
                return FillResult::rejected(reason.to_string());
            }
            if rng.gen::<f64>() > self.prob_fill_on_limit {
                return FillResult::rejected(FillRejectReason::NoFillsAtLimit.to_string());
            }
        }

        let fill_size = order.size.min(liquidity);

        let mut fill_price = reference;
        let mut slippage = 0.0;
        if rng.gen::<f64>() < self.prob_slippage {
            let size_ratio = fill_size / liquidity.max(1.0);
            let slippage_factor = (size_ratio * 2.0).min(1.0);
            let max_slip = self.max_slippage_bps / 10_000.0 * slippage_factor;
            slippage = rng.gen_range(0.0..=max_slip);
            fill_price = if is_buy { (reference + slippage).min(0.99) } else { (reference - slippage).max(0.01) };
        }

        let status = if fill_size + 1e-9 >= order.size { FillStatus::Filled } else { FillStatus::Partial };

        FillResult {
            status,
            filled_size: fill_size,
            fill_price,
            fees: 0.0,
            slippage,
            latency_ms: 0.0,
            reason: None,
        }
    }
}

/// Order-book walk: consumes resting liquidity level by level on the
/// taking side, producing a size-weighted average fill price. Supports
/// partial fills when the book can't absorb the full order.
pub struct RealisticFillModel {
    pub price_impact_factor: f64,
}

impl Default for RealisticFillModel {
    fn default() -> Self {
        Self { price_impact_factor: 0.1 }
    }
}

impl FillModel for RealisticFillModel {
    fn name(&self) -> &str {
        "realistic"
    }

    fn simulate_fill(
        &self,
        order: &Order,
        _snapshot: &MarketSnapshot,
        book: Option<&OrderBookSnapshot>,
        _liquidity: f64,
        _rng: &mut dyn rand::RngCore,
    ) -> FillResult {
        if !order.validate() {
            return FillResult::rejected(FillRejectReason::InvalidOrder.to_string());
        }
        let Some(book) = book else {
            return FillResult::rejected(FillRejectReason::EmptyOrderBook.to_string());
        };

        let levels: Vec<&crate::types::OrderBookLevel> = if order.side.is_buy() {
            book.asks.iter().collect()
        } else {
            book.bids.iter().collect()
        };
        if levels.is_empty() {
            return FillResult::rejected(FillRejectReason::EmptyOrderBook.to_string());
        }
        let best_price = levels[0].price;

        let limit = order.limit_price;
        let mut remaining = order.size;
        let mut notional = 0.0;
        let mut filled = 0.0;

        for level in levels {
            if remaining <= 0.0 {
                break;
            }
            if let Some(lp) = limit {
                let crosses = if order.side.is_buy() { level.price <= lp } else { level.price >= lp };
                if !crosses {
                    break;
                }
            }
            let take = remaining.min(level.size);
            notional += take * level.price;
            filled += take;
            remaining -= take;
        }

        if filled <= 0.0 {
            let reason = if order.order_type == OrderType::Limit {
                FillRejectReason::NoFillsAtLimit
            } else {
                FillRejectReason::NoLiquidity
            };
            return FillResult::rejected(reason.to_string());
        }

        let avg_price = (notional / filled).clamp(0.0, 1.0);
        let slippage = (avg_price - best_price).abs();

        let status = if filled + 1e-9 >= order.size {
            FillStatus::Filled
        } else if order.order_type == OrderType::Fok {
            return FillResult::rejected(FillRejectReason::NoLiquidity.to_string());
        } else {
            FillStatus::Partial
        };

        FillResult {
            status,
            filled_size: filled,
            fill_price: avg_price,
            fees: 0.0,
            slippage,
            latency_ms: 0.0,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketStatus, OrderBookLevel, Platform};
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ts() -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: ts(),
            question: "?".into(),
            yes_price: 0.40,
            no_price: 0.60,
            volume_24h: 0.0,
            liquidity: 0.0,
            resolution_date: None,
            status: MarketStatus::Active,
            tags: vec![],
            metadata: Default::default(),
        }
    }

    const LIQUIDITY: f64 = 1000.0;

    fn order(side: OrderSide, order_type: OrderType, limit_price: Option<f64>) -> Order {
        Order {
            order_id: "o1".into(),
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            side,
            order_type,
            size: 10.0,
            limit_price,
            time_in_force: "GTC".into(),
            created_at: ts(),
        }
    }

    #[test]
    fn basic_model_rejects_invalid_order() {
        let model = BasicFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let bad = order(OrderSide::BuyYes, OrderType::Market, None);
        let mut bad = bad;
        bad.size = 0.0;
        let result = model.simulate_fill(&bad, &snapshot(), None, LIQUIDITY, &mut rng);
        assert_eq!(result.reason.as_deref(), Some("invalid_order"));
    }

    #[test]
    fn basic_model_rejects_non_crossing_limit() {
        let model = BasicFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let buy = order(OrderSide::BuyYes, OrderType::Limit, Some(0.10));
        let result = model.simulate_fill(&buy, &snapshot(), None, LIQUIDITY, &mut rng);
        assert_eq!(result.reason.as_deref(), Some("price_below_limit"));
    }

    #[test]
    fn basic_model_fills_market_order() {
        let model = BasicFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let buy = order(OrderSide::BuyYes, OrderType::Market, None);
        let result = model.simulate_fill(&buy, &snapshot(), None, LIQUIDITY, &mut rng);
        assert!(result.filled());
        assert_eq!(result.filled_size, 10.0);
    }

    #[test]
    fn basic_model_rejects_zero_liquidity() {
        let model = BasicFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let buy = order(OrderSide::BuyYes, OrderType::Market, None);
        let result = model.simulate_fill(&buy, &snapshot(), None, 0.0, &mut rng);
        assert_eq!(result.reason.as_deref(), Some("no_liquidity"));
    }

    #[test]
    fn basic_model_partially_fills_when_liquidity_constrained() {
        let model = BasicFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let buy = order(OrderSide::BuyYes, OrderType::Market, None);
        let result = model.simulate_fill(&buy, &snapshot(), None, 4.0, &mut rng);
        assert_eq!(result.status, FillStatus::Partial);
        assert_eq!(result.filled_size, 4.0);
    }

    #[test]
    fn realistic_model_walks_book_and_partial_fills() {
        let model = RealisticFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let book = OrderBookSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: ts(),
            bids: vec![],
            asks: vec![
                OrderBookLevel { price: 0.40, size: 4.0, order_count: 1 },
                OrderBookLevel { price: 0.42, size: 4.0, order_count: 1 },
            ],
        };
        let buy = order(OrderSide::BuyYes, OrderType::Market, None);
        let result = model.simulate_fill(&buy, &snapshot(), Some(&book), LIQUIDITY, &mut rng);
        assert_eq!(result.status, FillStatus::Partial);
        assert_eq!(result.filled_size, 8.0);
    }

    #[test]
    fn realistic_model_slippage_is_absolute_distance_from_best_level() {
        let model = RealisticFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let book = OrderBookSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: ts(),
            bids: vec![],
            asks: vec![
                OrderBookLevel { price: 0.50, size: 5.0, order_count: 1 },
                OrderBookLevel { price: 0.525, size: 5.0, order_count: 1 },
            ],
        };
        let buy = order(OrderSide::BuyYes, OrderType::Market, None);
        let result = model.simulate_fill(&buy, &snapshot(), Some(&book), LIQUIDITY, &mut rng);
        assert!((result.slippage - 0.0125).abs() < 1e-9);
    }

    #[test]
    fn realistic_model_rejects_empty_book() {
        let model = RealisticFillModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let buy = order(OrderSide::BuyYes, OrderType::Market, None);
        let result = model.simulate_fill(&buy, &snapshot(), None, LIQUIDITY, &mut rng);
        assert_eq!(result.reason.as_deref(), Some("empty_order_book"));
    }
}
