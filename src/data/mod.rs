pub mod schema;
pub mod store;

pub use store::{DataStore, SqliteStore};

use std::path::Path;

use anyhow::{Context, Result};

use crate::types::MarketSnapshot;

/// Outcome of `import_snapshots_ndjson`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportStats {
    pub snapshots_imported: usize,
    pub lines_skipped: usize,
}

/// Load newline-delimited JSON `MarketSnapshot` records into a store.
/// Blank lines and lines that fail to parse are counted and skipped
/// rather than aborting the whole import.
pub fn import_snapshots_ndjson(path: &Path, store: &dyn DataStore) -> Result<ImportStats> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading import file {}", path.display()))?;
    let mut stats = ImportStats::default();
    let mut batch = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<MarketSnapshot>(line) {
            Ok(snapshot) => batch.push(snapshot),
            Err(_) => stats.lines_skipped += 1,
        }
    }
    stats.snapshots_imported = batch.len();
    store.save_snapshots(&batch)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SqliteStore;

    #[test]
    fn import_skips_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.ndjson");
        let good = r#"{"market_id":"m1","platform":"polymarket","timestamp":"2024-01-01T00:00:00Z","question":"?","yes_price":0.4,"no_price":0.6}"#;
        std::fs::write(&path, format!("{good}\n\n not json\n{good}\n")).unwrap();

        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        let stats = import_snapshots_ndjson(&path, &store).unwrap();
        assert_eq!(stats.snapshots_imported, 2);
        assert_eq!(stats.lines_skipped, 1);
    }
}
