//! Per-platform fee schedules.

use crate::types::Platform;

/// Computes trading fees for a fill. `is_taker` distinguishes maker/taker
/// where the platform's schedule cares (Polymarket only).
#[derive(Debug, Clone, Copy)]
pub struct FeeModel {
    use_platform_fees: bool,
    custom_fee_pct: f64,
}

impl FeeModel {
    pub fn new(use_platform_fees: bool, custom_fee_pct: f64) -> Self {
        Self { use_platform_fees, custom_fee_pct }
    }

    pub fn platform_default() -> Self {
        Self::new(true, 0.0)
    }

    /// `notional = size * price`.
    pub fn calculate_fee(&self, platform: Platform, notional: f64, size: f64, is_taker: bool) -> f64 {
        if notional <= 0.0 {
            return 0.0;
        }
        if !self.use_platform_fees {
            return notional * self.custom_fee_pct;
        }
        match platform {
            // 2% of notional on taker fills, free for resting liquidity.
            Platform::Polymarket => {
                if is_taker {
                    notional * 0.02
                } else {
                    0.0
                }
            }
            // 7 cents per contract, flat regardless of fill price.
            Platform::Kalshi => size * 0.07,
            Platform::Manifold => 0.0,
        }
    }
}

impl Default for FeeModel {
    fn default() -> Self {
        Self::platform_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polymarket_charges_taker_only() {
        let fm = FeeModel::platform_default();
        let taker = fm.calculate_fee(Platform::Polymarket, 100.0, 200.0, true);
        let maker = fm.calculate_fee(Platform::Polymarket, 100.0, 200.0, false);
        assert!((taker - 2.0).abs() < 1e-9);
        assert_eq!(maker, 0.0);
    }

    #[test]
    fn kalshi_fee_is_flat_per_contract_uncapped() {
        let fm = FeeModel::platform_default();
        // size=1000 contracts at price 0.01 => notional=10, fee=70 regardless.
        let fee = fm.calculate_fee(Platform::Kalshi, 10.0, 1000.0, true);
        assert!((fee - 70.0).abs() < 1e-9);
    }

    #[test]
    fn manifold_is_free() {
        let fm = FeeModel::platform_default();
        assert_eq!(fm.calculate_fee(Platform::Manifold, 1000.0, 1000.0, true), 0.0);
    }
}
