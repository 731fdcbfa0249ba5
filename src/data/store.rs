use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};

use crate::types::{
    MarketResolution, MarketSnapshot, MarketStatus, OrderBookLevel, OrderBookSnapshot, OrderSide, Platform,
    ResolutionOutcome, TradeEvent,
};

use super::schema;

fn platform_from_str(s: &str) -> Platform {
    match s {
        "kalshi" => Platform::Kalshi,
        "manifold" => Platform::Manifold,
        _ => Platform::Polymarket,
    }
}

fn status_from_str(s: &str) -> MarketStatus {
    match s {
        "closed" => MarketStatus::Closed,
        "resolved" => MarketStatus::Resolved,
        "cancelled" => MarketStatus::Cancelled,
        _ => MarketStatus::Active,
    }
}

fn outcome_from_str(s: &str) -> ResolutionOutcome {
    match s {
        "NO" => ResolutionOutcome::No,
        "CANCELLED" => ResolutionOutcome::Cancelled,
        "AMBIGUOUS" => ResolutionOutcome::Ambiguous,
        _ => ResolutionOutcome::Yes,
    }
}

fn side_from_str(s: &str) -> OrderSide {
    match s {
        "BUY_NO" => OrderSide::BuyNo,
        "SELL_YES" => OrderSide::SellYes,
        "SELL_NO" => OrderSide::SellNo,
        _ => OrderSide::BuyYes,
    }
}

fn side_to_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::BuyYes => "BUY_YES",
        OrderSide::BuyNo => "BUY_NO",
        OrderSide::SellYes => "SELL_YES",
        OrderSide::SellNo => "SELL_NO",
    }
}

fn ms(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

/// Abstraction over historical storage of everything the event source and
/// engine read back in timestamp order.
pub trait DataStore: Send {
    fn init(&self) -> Result<()>;

    fn save_snapshots(&self, snapshots: &[MarketSnapshot]) -> Result<()>;
    fn save_orderbooks(&self, books: &[OrderBookSnapshot]) -> Result<()>;
    fn save_trades(&self, trades: &[TradeEvent]) -> Result<()>;
    fn save_resolutions(&self, resolutions: &[MarketResolution]) -> Result<()>;

    fn load_snapshots(&self, market_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<MarketSnapshot>>;
    fn load_orderbooks(&self, market_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<OrderBookSnapshot>>;
    fn load_trades(&self, market_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TradeEvent>>;
    fn load_resolutions(&self, market_id: &str) -> Result<Vec<MarketResolution>>;

    /// Every distinct market id with at least one snapshot on record.
    /// Used by the CLI to discover what a historical replay can cover
    /// without requiring the caller to already know the market ids.
    fn list_market_ids(&self) -> Result<Vec<String>>;
}

/// SQLite-backed implementation.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl DataStore for SqliteStore {
    fn init(&self) -> Result<()> {
        self.conn.execute_batch(schema::CREATE_SNAPSHOTS)?;
        self.conn.execute_batch(schema::CREATE_ORDERBOOKS)?;
        self.conn.execute_batch(schema::CREATE_ORDERBOOK_LEVELS)?;
        self.conn.execute_batch(schema::CREATE_TRADES)?;
        self.conn.execute_batch(schema::CREATE_RESOLUTIONS)?;
        self.conn.execute_batch(schema::CREATE_INDEXES)?;
        Ok(())
    }

    fn save_snapshots(&self, snapshots: &[MarketSnapshot]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO pb_snapshots
                 (market_id, platform, timestamp_ms, question, yes_price, no_price,
                  volume_24h, liquidity, resolution_ts, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for s in snapshots {
                stmt.execute(params![
                    s.market_id,
                    s.platform.as_str(),
                    ms(s.timestamp),
                    s.question,
                    s.yes_price,
                    s.no_price,
                    s.volume_24h,
                    s.liquidity,
                    s.resolution_date.map(ms),
                    format!("{:?}", s.status).to_lowercase(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_orderbooks(&self, books: &[OrderBookSnapshot]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut book_stmt =
                tx.prepare_cached("INSERT INTO pb_orderbooks (market_id, platform, timestamp_ms) VALUES (?1, ?2, ?3)")?;
            let mut level_stmt = tx.prepare_cached(
                "INSERT INTO pb_orderbook_levels (book_id, side, price, size, order_count) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for b in books {
                book_stmt.execute(params![b.market_id, b.platform.as_str(), ms(b.timestamp)])?;
                let book_id = tx.last_insert_rowid();
                for lvl in &b.bids {
                    level_stmt.execute(params![book_id, "bid", lvl.price, lvl.size, lvl.order_count])?;
                }
                for lvl in &b.asks {
                    level_stmt.execute(params![book_id, "ask", lvl.price, lvl.size, lvl.order_count])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_trades(&self, trades: &[TradeEvent]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO pb_trades
                 (trade_id, market_id, platform, timestamp_ms, side, price, size, is_taker, fees)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for t in trades {
                stmt.execute(params![
                    t.trade_id,
                    t.market_id,
                    t.platform.as_str(),
                    ms(t.timestamp),
                    side_to_str(t.side),
                    t.price,
                    t.size,
                    t.is_taker as i64,
                    t.fees,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_resolutions(&self, resolutions: &[MarketResolution]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO pb_resolutions (market_id, platform, timestamp_ms, outcome, question)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in resolutions {
                let outcome = match r.outcome {
                    ResolutionOutcome::Yes => "YES",
                    ResolutionOutcome::No => "NO",
                    ResolutionOutcome::Cancelled => "CANCELLED",
                    ResolutionOutcome::Ambiguous => "AMBIGUOUS",
                };
                stmt.execute(params![r.market_id, r.platform.as_str(), ms(r.timestamp), outcome, r.question])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_snapshots(&self, market_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<MarketSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT market_id, platform, timestamp_ms, question, yes_price, no_price,
                    volume_24h, liquidity, resolution_ts, status
             FROM pb_snapshots
             WHERE market_id = ?1 AND timestamp_ms BETWEEN ?2 AND ?3
             ORDER BY timestamp_ms ASC",
        )?;
        let rows = stmt.query_map(params![market_id, ms(start), ms(end)], |row| {
            Ok(MarketSnapshot {
                market_id: row.get(0)?,
                platform: platform_from_str(&row.get::<_, String>(1)?),
                timestamp: from_ms(row.get(2)?),
                question: row.get(3)?,
                yes_price: row.get(4)?,
                no_price: row.get(5)?,
                volume_24h: row.get(6)?,
                liquidity: row.get(7)?,
                resolution_date: row.get::<_, Option<i64>>(8)?.map(from_ms),
                status: status_from_str(&row.get::<_, String>(9)?),
                tags: Vec::new(),
                metadata: Default::default(),
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn load_orderbooks(&self, market_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<OrderBookSnapshot>> {
        let mut book_stmt = self.conn.prepare(
            "SELECT id, market_id, platform, timestamp_ms FROM pb_orderbooks
             WHERE market_id = ?1 AND timestamp_ms BETWEEN ?2 AND ?3
             ORDER BY timestamp_ms ASC",
        )?;
        let books: Vec<(i64, String, String, i64)> = book_stmt
            .query_map(params![market_id, ms(start), ms(end)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut level_stmt = self
            .conn
            .prepare("SELECT side, price, size, order_count FROM pb_orderbook_levels WHERE book_id = ?1 ORDER BY side, price")?;

        let mut result = Vec::with_capacity(books.len());
        for (book_id, mid, platform, ts) in books {
            let levels: Vec<(String, OrderBookLevel)> = level_stmt
                .query_map(params![book_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        OrderBookLevel { price: row.get(1)?, size: row.get(2)?, order_count: row.get(3)? },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let (bids, asks): (Vec<_>, Vec<_>) = levels.into_iter().partition(|(side, _)| side == "bid");
            result.push(OrderBookSnapshot {
                market_id: mid,
                platform: platform_from_str(&platform),
                timestamp: from_ms(ts),
                bids: bids.into_iter().map(|(_, l)| l).collect(),
                asks: asks.into_iter().map(|(_, l)| l).collect(),
            });
        }
        Ok(result)
    }

    fn load_trades(&self, market_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<TradeEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT trade_id, market_id, platform, timestamp_ms, side, price, size, is_taker, fees
             FROM pb_trades
             WHERE market_id = ?1 AND timestamp_ms BETWEEN ?2 AND ?3
             ORDER BY timestamp_ms ASC",
        )?;
        let rows = stmt.query_map(params![market_id, ms(start), ms(end)], |row| {
            Ok(TradeEvent {
                trade_id: row.get(0)?,
                market_id: row.get(1)?,
                platform: platform_from_str(&row.get::<_, String>(2)?),
                timestamp: from_ms(row.get(3)?),
                side: side_from_str(&row.get::<_, String>(4)?),
                price: row.get(5)?,
                size: row.get(6)?,
                is_taker: row.get::<_, i64>(7)? != 0,
                fees: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn load_resolutions(&self, market_id: &str) -> Result<Vec<MarketResolution>> {
        let mut stmt = self.conn.prepare(
            "SELECT market_id, platform, timestamp_ms, outcome, question FROM pb_resolutions WHERE market_id = ?1",
        )?;
        let rows = stmt.query_map(params![market_id], |row| {
            Ok(MarketResolution {
                market_id: row.get(0)?,
                platform: platform_from_str(&row.get::<_, String>(1)?),
                timestamp: from_ms(row.get(2)?),
                outcome: outcome_from_str(&row.get::<_, String>(3)?),
                question: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn list_market_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT market_id FROM pb_snapshots ORDER BY market_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketStatus;

    fn ts(offset: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset, 0).unwrap()
    }

    fn snapshot(market_id: &str, t: i64) -> MarketSnapshot {
        MarketSnapshot {
            market_id: market_id.to_string(),
            platform: Platform::Polymarket,
            timestamp: ts(t),
            question: "Will it rain?".into(),
            yes_price: 0.4,
            no_price: 0.6,
            volume_24h: 10.0,
            liquidity: 100.0,
            resolution_date: None,
            status: MarketStatus::Active,
            tags: vec![],
            metadata: Default::default(),
        }
    }

    #[test]
    fn round_trips_snapshots_in_timestamp_order() {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store.save_snapshots(&[snapshot("m1", 10), snapshot("m1", 0), snapshot("m1", 5)]).unwrap();
        let loaded = store.load_snapshots("m1", ts(0), ts(100)).unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn round_trips_orderbooks_with_bid_ask_split() {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        let book = OrderBookSnapshot {
            market_id: "m1".into(),
            platform: Platform::Polymarket,
            timestamp: ts(0),
            bids: vec![OrderBookLevel { price: 0.49, size: 10.0, order_count: 1 }],
            asks: vec![OrderBookLevel { price: 0.51, size: 20.0, order_count: 1 }],
        };
        store.save_orderbooks(&[book]).unwrap();
        let loaded = store.load_orderbooks("m1", ts(0), ts(100)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].bids.len(), 1);
        assert_eq!(loaded[0].asks.len(), 1);
    }

    #[test]
    fn list_market_ids_returns_distinct_ids() {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store.save_snapshots(&[snapshot("m2", 0), snapshot("m1", 0), snapshot("m1", 5)]).unwrap();
        assert_eq!(store.list_market_ids().unwrap(), vec!["m1".to_string(), "m2".to_string()]);
    }

    #[test]
    fn round_trips_resolutions() {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store
            .save_resolutions(&[MarketResolution {
                market_id: "m1".into(),
                platform: Platform::Kalshi,
                timestamp: ts(0),
                outcome: ResolutionOutcome::Cancelled,
                question: "q".into(),
            }])
            .unwrap();
        let loaded = store.load_resolutions("m1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].outcome, ResolutionOutcome::Cancelled);
    }
}
