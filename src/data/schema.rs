//! DDL for this crate's own SQLite tables.

pub const CREATE_SNAPSHOTS: &str = "
CREATE TABLE IF NOT EXISTS pb_snapshots (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id     TEXT NOT NULL,
    platform      TEXT NOT NULL,
    timestamp_ms  INTEGER NOT NULL,
    question      TEXT NOT NULL,
    yes_price     REAL NOT NULL,
    no_price      REAL NOT NULL,
    volume_24h    REAL NOT NULL DEFAULT 0.0,
    liquidity     REAL NOT NULL DEFAULT 0.0,
    resolution_ts INTEGER,
    status        TEXT NOT NULL
);
";

pub const CREATE_ORDERBOOKS: &str = "
CREATE TABLE IF NOT EXISTS pb_orderbooks (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    market_id    TEXT NOT NULL,
    platform     TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL
);
";

pub const CREATE_ORDERBOOK_LEVELS: &str = "
CREATE TABLE IF NOT EXISTS pb_orderbook_levels (
    book_id     INTEGER NOT NULL,
    side        TEXT NOT NULL,
    price       REAL NOT NULL,
    size        REAL NOT NULL,
    order_count INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (book_id) REFERENCES pb_orderbooks(id)
);
";

pub const CREATE_TRADES: &str = "
CREATE TABLE IF NOT EXISTS pb_trades (
    trade_id     TEXT PRIMARY KEY,
    market_id    TEXT NOT NULL,
    platform     TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    side         TEXT NOT NULL,
    price        REAL NOT NULL,
    size         REAL NOT NULL,
    is_taker     INTEGER NOT NULL DEFAULT 1,
    fees         REAL NOT NULL DEFAULT 0.0
);
";

pub const CREATE_RESOLUTIONS: &str = "
CREATE TABLE IF NOT EXISTS pb_resolutions (
    market_id    TEXT PRIMARY KEY,
    platform     TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    outcome      TEXT NOT NULL,
    question     TEXT NOT NULL DEFAULT ''
);
";

pub const CREATE_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_pb_snapshots_market_ts ON pb_snapshots(market_id, timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_pb_orderbooks_market_ts ON pb_orderbooks(market_id, timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_pb_orderbook_levels_book ON pb_orderbook_levels(book_id);
CREATE INDEX IF NOT EXISTS idx_pb_trades_market_ts ON pb_trades(market_id, timestamp_ms);
";
