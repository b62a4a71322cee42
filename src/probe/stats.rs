//! Stats cache probe implementation
//!
//! Data format: ~/.claude/stats-cache.json, a single object of self-reported
//! totals (`totalSessions`, `totalMessages`, `firstSessionDate`). It carries
//! no session key, so it only feeds the global aggregate.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{SourceProbe, SourceReader, STATS};
use crate::model::StatsRecord;

#[derive(Debug, Clone)]
pub struct StatsProbe {
    path: PathBuf,
}

impl StatsProbe {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SourceProbe for StatsProbe {
    fn id(&self) -> &str {
        STATS
    }

    fn description(&self) -> &str {
        "Aggregate usage totals (stats-cache.json)"
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceReader for StatsProbe {
    type Output = Option<StatsRecord>;

    fn read(&self) -> Result<Option<StatsRecord>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let raw: Value = serde_json::from_str(&content).context("Malformed stats cache")?;

        let stats = raw.is_object().then_some(StatsRecord { raw });
        info!(source = STATS, loaded = stats.is_some(), "stats cache read");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::format_timestamp;
    use std::fs;

    #[test]
    fn test_reads_totals_and_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats-cache.json");
        fs::write(
            &path,
            r#"{"totalSessions":12,"totalMessages":340,"firstSessionDate":"2025-01-04T00:00:00.000Z"}"#,
        )
        .unwrap();

        let stats = StatsProbe::new(path).read().unwrap().unwrap();
        assert_eq!(stats.total_sessions(), 12);
        assert_eq!(stats.total_messages(), 340);
        assert_eq!(
            format_timestamp(&stats.tracking_start().unwrap()),
            "2025-01-04T00:00:00.000Z"
        );
    }

    #[test]
    fn test_malformed_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats-cache.json");
        fs::write(&path, "{").unwrap();
        assert!(StatsProbe::new(path).read().is_err());
    }
}
