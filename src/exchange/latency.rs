//! Gaussian order-latency sampling.

use rand::Rng;
use rand_distr::Normal;

/// Samples a fill latency in milliseconds from `N(mean_ms, std_ms)`,
/// clamped to `[min_ms, max_ms]`. Deterministic when constructed with a
/// seeded RNG (see `SimulatedExchange::seeded`).
pub struct LatencyModel {
    normal: Normal<f64>,
    min_ms: f64,
    max_ms: f64,
}

impl LatencyModel {
    pub fn new(mean_ms: f64, std_ms: f64, min_ms: f64, max_ms: f64) -> Self {
        let normal = Normal::new(mean_ms, std_ms.max(1e-9)).expect("valid latency distribution");
        Self { normal, min_ms, max_ms }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        rng.sample(self.normal).clamp(self.min_ms, self.max_ms)
    }
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self::new(50.0, 20.0, 10.0, 500.0)
    }
}
