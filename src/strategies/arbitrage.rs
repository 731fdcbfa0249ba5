//! Cross-platform arbitrage on markets sharing (nearly) the same question.

use std::collections::HashMap;

use crate::portfolio::VirtualPortfolio;
use crate::strategies::Strategy;
use crate::types::{MarketSnapshot, OrderSide, Platform, StrategySignal};

const NAME: &str = "arbitrage";
const PREFIXES: [&str; 4] = ["will ", "is ", "does ", "can "];

fn normalize_question(question: &str) -> String {
    let lower = question.to_lowercase();
    let trimmed = lower.trim();
    for prefix in PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}

pub struct ArbitrageStrategy {
    min_spread: f64,
    max_spread: f64,
    min_liquidity: f64,
    max_position_per_market: f64,
    registry: HashMap<String, HashMap<Platform, String>>,
    latest: HashMap<String, MarketSnapshot>,
}

impl ArbitrageStrategy {
    pub fn new() -> Self {
        Self {
            min_spread: 0.02,
            max_spread: 0.20,
            min_liquidity: 1000.0,
            max_position_per_market: 500.0,
            registry: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    fn find_correlated(&self, normalized: &str, platform: Platform) -> Option<&String> {
        self.registry
            .get(normalized)
            .and_then(|by_platform| by_platform.iter().find(|(p, _)| **p != platform).map(|(_, id)| id))
    }
}

impl Default for ArbitrageStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for ArbitrageStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Cross-platform arbitrage on matching questions"
    }

    fn on_market_update(&mut self, snapshot: &MarketSnapshot, portfolio: &VirtualPortfolio) -> Vec<StrategySignal> {
        let normalized = normalize_question(&snapshot.question);
        self.registry
            .entry(normalized.clone())
            .or_default()
            .insert(snapshot.platform, snapshot.market_id.clone());
        self.latest.insert(snapshot.market_id.clone(), snapshot.clone());

        let Some(other_id) = self.find_correlated(&normalized, snapshot.platform).cloned() else {
            return Vec::new();
        };
        let Some(other) = self.latest.get(&other_id).cloned() else {
            return Vec::new();
        };

        let spread = (snapshot.yes_price - other.yes_price).abs();
        if spread < self.min_spread || spread > self.max_spread {
            return Vec::new();
        }
        if snapshot.liquidity < self.min_liquidity || other.liquidity < self.min_liquidity {
            return Vec::new();
        }

        let confidence = (spread / self.min_spread).min(1.0);
        let (buy, sell) = if snapshot.yes_price < other.yes_price { (snapshot, &other) } else { (&other, snapshot) };

        let mut signals = vec![StrategySignal {
            strategy: NAME.to_string(),
            market_id: buy.market_id.clone(),
            platform: buy.platform,
            side: OrderSide::BuyYes,
            size: self.max_position_per_market,
            confidence,
            target_price: None,
            stop_loss: None,
            take_profit: None,
            metadata: HashMap::new(),
        }];

        if let Some(position) = portfolio.get_position(&sell.market_id) {
            if position.yes_shares > 0.0 {
                signals.push(StrategySignal {
                    strategy: NAME.to_string(),
                    market_id: sell.market_id.clone(),
                    platform: sell.platform,
                    side: OrderSide::SellYes,
                    size: self.max_position_per_market.min(position.yes_shares),
                    confidence,
                    target_price: None,
                    stop_loss: None,
                    take_profit: None,
                    metadata: HashMap::new(),
                });
            }
        }

        signals
    }

    fn reset(&mut self) {
        self.registry.clear();
        self.latest.clear();
    }
}
