use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::MemoryError;

/// File name of the stats sidecar inside the index directory.
const STATS_FILE: &str = "stats.json";

/// Operational counters persisted next to the index.
///
/// Kept in a sidecar JSON file rather than the index itself so reporting
/// survives even when the index cannot be opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of records currently in the index.
    pub doc_count: u64,
    /// Unix epoch seconds of the last full rebuild, `None` if never rebuilt.
    pub last_rebuild_time: Option<f64>,
}

/// Read-only stats view handed to operational reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub doc_count: u64,
    pub last_rebuild_time: Option<f64>,
    pub index_location: PathBuf,
}

impl StatsSnapshot {
    /// Last rebuild as a human-readable UTC timestamp.
    pub fn last_rebuild_utc(&self) -> Option<String> {
        self.last_rebuild_time
            .and_then(|secs| chrono::DateTime::from_timestamp(secs as i64, 0))
            .map(|dt| dt.to_rfc3339())
    }
}

/// Read the stats sidecar. A missing or corrupt file reads as zeroed stats.
pub fn read_stats(index_dir: &Path) -> IndexStats {
    let path = index_dir.join(STATS_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            debug!(file = %path.display(), error = %e, "stats file unreadable, starting fresh");
            IndexStats::default()
        }),
        Err(_) => IndexStats::default(),
    }
}

/// Write the stats sidecar synchronously.
pub fn write_stats(index_dir: &Path, stats: &IndexStats) -> Result<(), MemoryError> {
    let json = serde_json::to_string_pretty(stats).map_err(MemoryError::persistence)?;
    std::fs::write(index_dir.join(STATS_FILE), json).map_err(MemoryError::persistence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_stats(dir.path()), IndexStats::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let stats = IndexStats {
            doc_count: 12,
            last_rebuild_time: Some(1_720_000_000.5),
        };
        write_stats(dir.path(), &stats).unwrap();
        assert_eq!(read_stats(dir.path()), stats);
    }

    #[test]
    fn test_corrupt_file_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATS_FILE), "{not json").unwrap();
        assert_eq!(read_stats(dir.path()), IndexStats::default());
    }

    #[test]
    fn test_snapshot_formats_rebuild_time() {
        let snap = StatsSnapshot {
            doc_count: 1,
            last_rebuild_time: Some(0.0),
            index_location: PathBuf::from("/tmp/index"),
        };
        assert_eq!(snap.last_rebuild_utc().unwrap(), "1970-01-01T00:00:00+00:00");
    }
}
