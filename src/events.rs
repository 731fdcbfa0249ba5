//! Event sources: historical replay from a `DataStore`, and a synthetic
//! mock feed for quick strategy iteration without a populated database.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use crate::data::DataStore;
use crate::types::{MarketResolution, Platform, ResolutionOutcome, SimulationEvent};

/// Produces the full ordered event stream for a run. Implementors may
/// materialise eagerly (as `MockEventSource` does) or stream from
/// storage; either way `get_events` returns everything already sorted by
/// `(timestamp, intra_tick_rank)`.
pub trait EventSource: Send {
    fn get_events(&mut self) -> Result<Vec<SimulationEvent>>;
}

/// Replays snapshots/resolutions recorded in a `DataStore` for a set of
/// markets within `[start, end]`.
pub struct HistoricalEventSource<'a> {
    store: &'a dyn DataStore,
    market_ids: Vec<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl<'a> HistoricalEventSource<'a> {
    pub fn new(store: &'a dyn DataStore, market_ids: Vec<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { store, market_ids, start, end }
    }
}

impl EventSource for HistoricalEventSource<'_> {
    fn get_events(&mut self) -> Result<Vec<SimulationEvent>> {
        let mut events = Vec::new();
        for market_id in &self.market_ids {
            for s in self.store.load_snapshots(market_id, self.start, self.end)? {
                events.push(SimulationEvent::MarketUpdate {
                    timestamp: s.timestamp,
                    market_id: s.market_id,
                    platform: s.platform,
                    yes_price: s.yes_price,
                    no_price: s.no_price,
                    volume: s.volume_24h,
                    liquidity: s.liquidity,
                });
            }
            for b in self.store.load_orderbooks(market_id, self.start, self.end)? {
                events.push(SimulationEvent::OrderBookUpdate { timestamp: b.timestamp, book: b });
            }
            for r in self.store.load_resolutions(market_id)? {
                if r.timestamp >= self.start && r.timestamp <= self.end {
                    events.push(SimulationEvent::Resolution { timestamp: r.timestamp, resolution: r });
                }
            }
        }
        events.sort_by_key(|e| (e.timestamp(), e.intra_tick_rank()));
        Ok(events)
    }
}

/// Synthetic feed used when a run has no strategies' worth of historical
/// data to replay against. Each market gets a uniform-random starting
/// price, a uniform-random resolution date 7-90 days out, a Gaussian
/// random walk in between, and a coin-flip YES/NO outcome.
pub struct MockEventSource {
    market_count: usize,
    platforms: Vec<Platform>,
    time_step_minutes: i64,
    start: DateTime<Utc>,
    rng: ChaCha8Rng,
}

impl MockEventSource {
    pub fn new(market_count: usize, platforms: Vec<Platform>, time_step_minutes: i64, start: DateTime<Utc>, rng: ChaCha8Rng) -> Self {
        Self { market_count, platforms, time_step_minutes, start, rng }
    }
}

impl EventSource for MockEventSource {
    fn get_events(&mut self) -> Result<Vec<SimulationEvent>> {
        let step_normal = Normal::new(0.0, 0.02).expect("valid random-walk distribution");
        let mut events = Vec::new();

        for i in 0..self.market_count {
            let market_id = format!("mock-{i}");
            let platform = self.platforms[i % self.platforms.len()];
            let resolution_offset_days = self.rng.gen_range(7..=90);
            let resolution_at = self.start + Duration::days(resolution_offset_days);

            let mut price = self.rng.gen_range(0.3..=0.7);
            let liquidity = self.rng.gen_range(500.0..=5000.0);
            let mut t = self.start;
            while t < resolution_at {
                events.push(SimulationEvent::MarketUpdate {
                    timestamp: t,
                    market_id: market_id.clone(),
                    platform,
                    yes_price: price,
                    no_price: 1.0 - price,
                    volume: 0.0,
                    liquidity,
                });
                let step: f64 = self.rng.sample(step_normal);
                price = (price + step).clamp(0.01, 0.99);
                t += Duration::minutes(self.time_step_minutes);
            }

            let outcome = if self.rng.gen_bool(0.5) { ResolutionOutcome::Yes } else { ResolutionOutcome::No };
            events.push(SimulationEvent::Resolution {
                timestamp: resolution_at,
                resolution: MarketResolution {
                    market_id: market_id.clone(),
                    platform,
                    timestamp: resolution_at,
                    outcome,
                    question: format!("Mock question {i}"),
                },
            });
        }

        events.sort_by_key(|e| (e.timestamp(), e.intra_tick_rank()));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn mock_source_produces_sorted_events_ending_in_resolution_per_market() {
        let mut source = MockEventSource::new(
            2,
            vec![Platform::Polymarket, Platform::Kalshi],
            60,
            Utc::now(),
            ChaCha8Rng::seed_from_u64(1),
        );
        let events = source.get_events().unwrap();
        assert!(events.windows(2).all(|w| (w[0].timestamp(), w[0].intra_tick_rank()) <= (w[1].timestamp(), w[1].intra_tick_rank())));
        let resolutions = events.iter().filter(|e| matches!(e, SimulationEvent::Resolution { .. })).count();
        assert_eq!(resolutions, 2);
    }

    #[test]
    fn historical_source_merges_snapshots_and_resolutions_sorted() {
        use crate::data::SqliteStore;
        use chrono::TimeZone;

        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        let ts = |o: i64| Utc.timestamp_opt(1_700_000_000 + o, 0).unwrap();
        store
            .save_snapshots(&[crate::types::MarketSnapshot {
                market_id: "m1".into(),
                platform: Platform::Polymarket,
                timestamp: ts(0),
                question: "?".into(),
                yes_price: 0.5,
                no_price: 0.5,
                volume_24h: 0.0,
                liquidity: 0.0,
                resolution_date: None,
                status: crate::types::MarketStatus::Active,
                tags: vec![],
                metadata: Default::default(),
            }])
            .unwrap();
        store
            .save_resolutions(&[MarketResolution {
                market_id: "m1".into(),
                platform: Platform::Polymarket,
                timestamp: ts(10),
                outcome: ResolutionOutcome::Yes,
                question: "?".into(),
            }])
            .unwrap();

        let mut source = HistoricalEventSource::new(&store, vec!["m1".to_string()], ts(0), ts(100));
        let events = source.get_events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SimulationEvent::MarketUpdate { .. }));
        assert!(matches!(events[1], SimulationEvent::Resolution { .. }));
    }
}
