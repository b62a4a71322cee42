//! Facet probe implementation
//!
//! Data format: ~/.claude/usage-data/facets/<session_id>.json, one
//! qualitative annotation object per file.

use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{SourceProbe, SourceReader, FACET};
use crate::model::FacetRecord;

#[derive(Debug, Clone)]
pub struct FacetProbe {
    base_path: PathBuf,
}

impl FacetProbe {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn read_facet(path: &Path) -> Option<FacetRecord> {
        let content = std::fs::read_to_string(path).ok()?;
        let data: Value = match serde_json::from_str(&content) {
            Ok(data @ Value::Object(_)) => data,
            Ok(_) => return None,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping malformed facet");
                return None;
            }
        };

        let session_id = data
            .get("session_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(String::from))?;

        Some(FacetRecord { session_id, data })
    }
}

impl SourceProbe for FacetProbe {
    fn id(&self) -> &str {
        FACET
    }

    fn description(&self) -> &str {
        "Per-session qualitative facets (usage-data/facets/*.json)"
    }

    fn path(&self) -> &Path {
        &self.base_path
    }
}

impl SourceReader for FacetProbe {
    type Output = Vec<FacetRecord>;

    /// Records come back in file-name order.
    fn read(&self) -> Result<Vec<FacetRecord>> {
        let pattern = self.base_path.join("*.json");
        let facets: Vec<FacetRecord> = glob::glob(&pattern.to_string_lossy())?
            .filter_map(|p| p.ok())
            .filter_map(|path| Self::read_facet(&path))
            .collect();

        info!(source = FACET, facets = facets.len(), "facets loaded");
        Ok(facets)
    }
}
