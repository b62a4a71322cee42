//! Session index probe implementation
//!
//! Data format: ~/.claude/projects/<project_dir>/sessions-index.json, an
//! object with an `entries` array of session summaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{SourceProbe, SourceReader, INDEX};
use crate::model::{count_value, parse_timestamp_str, IndexRecord};

pub const INDEX_FILE_NAME: &str = "sessions-index.json";

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    entries: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    session_id: String,
    project_path: Option<String>,
    created: Option<String>,
    modified: Option<String>,
    #[serde(default)]
    message_count: Value,
    first_prompt: Option<String>,
    git_branch: Option<String>,
    summary: Option<String>,
}

impl IndexEntry {
    fn into_record(self, project_dir: &str) -> IndexRecord {
        IndexRecord {
            session_id: self.session_id,
            project_path: self.project_path.filter(|p| !p.is_empty()),
            project_dir: project_dir.to_string(),
            created: self.created.as_deref().and_then(parse_timestamp_str),
            modified: self.modified.as_deref().and_then(parse_timestamp_str),
            message_count: count_value(&self.message_count),
            first_prompt: self.first_prompt,
            git_branch: self.git_branch.filter(|b| !b.is_empty()),
            summary: self.summary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexProbe {
    base_path: PathBuf,
}

impl IndexProbe {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Parse one index file. Entries that do not decode are skipped.
    fn read_index_file(path: &Path, project_dir: &str) -> Result<Vec<IndexRecord>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: IndexFile = serde_json::from_str(&content)
            .with_context(|| format!("Malformed index {}", path.display()))?;

        Ok(file
            .entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<IndexEntry>(entry) {
                Ok(entry) => Some(entry.into_record(project_dir)),
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping index entry");
                    None
                }
            })
            .collect())
    }
}

impl SourceProbe for IndexProbe {
    fn id(&self) -> &str {
        INDEX
    }

    fn description(&self) -> &str {
        "Per-project session indexes (sessions-index.json)"
    }

    fn path(&self) -> &Path {
        &self.base_path
    }
}

impl SourceReader for IndexProbe {
    type Output = HashMap<String, IndexRecord>;

    fn read(&self) -> Result<Self::Output> {
        let mut sessions = HashMap::new();
        let pattern = self.base_path.join("*").join(INDEX_FILE_NAME);
        let pattern = pattern.to_string_lossy();

        // glob yields paths in sorted order, so a later project wins on duplicate ids
        for path in glob::glob(&pattern)?.filter_map(|p| p.ok()) {
            let project_dir = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string();

            match Self::read_index_file(&path, &project_dir) {
                Ok(records) => {
                    for record in records {
                        sessions.insert(record.session_id.clone(), record);
                    }
                }
                Err(err) => debug!(error = %err, "skipping index file"),
            }
        }

        info!(source = INDEX, sessions = sessions.len(), "indexed sessions loaded");
        Ok(sessions)
    }
}
