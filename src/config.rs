//! Configuration management with YAML support

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{InsightError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the Claude data directory; default source paths hang off it
    #[serde(default = "default_claude_dir")]
    pub claude_dir: String,

    /// Overrides the home directory used for the reserved "home" project label
    #[serde(default)]
    pub home_dir: Option<String>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
}

/// Individual source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub path: Option<String>,
}

/// Report output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub path: Option<String>,
}

/// Transcript scan configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

// Default value functions
fn default_claude_dir() -> String {
    "~/.claude".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_workers() -> usize {
    8
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            claude_dir: default_claude_dir(),
            home_dir: None,
            output: OutputConfig::default(),
            scan: ScanConfig::default(),
            sources: HashMap::new(),
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./insightful.yaml (current directory)
    /// 3. ~/.config/insightful/insightful.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "insightful.yaml".to_string(),
            shellexpand::tilde("~/.config/insightful/insightful.yaml").to_string(),
        ];

        for search_path in &search_paths {
            let candidate = Path::new(search_path);
            if candidate.exists() {
                return Self::load_from(candidate);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Load configuration from exactly this file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InsightError::io(format!("reading {}", path.display()), e))?;
        serde_yaml::from_str(&content).map_err(|source| InsightError::ConfigMalformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the Claude data directory, expanding ~ to home directory
    pub fn claude_dir(&self) -> PathBuf {
        expand(&self.claude_dir)
    }

    /// The actor's home directory, if it can be determined
    pub fn home_dir(&self) -> Option<PathBuf> {
        match &self.home_dir {
            Some(p) => Some(expand(p)),
            None => dirs::home_dir(),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output.path {
            Some(p) => expand(p),
            None => self
                .claude_dir()
                .join("usage-data")
                .join("insightful-data.json"),
        }
    }

    /// Bounded width of the transcript fan-out, never zero
    pub fn workers(&self) -> usize {
        self.scan.workers.max(1)
    }

    /// Check if a source is enabled (unconfigured sources are)
    pub fn is_source_enabled(&self, source_id: &str) -> bool {
        self.sources.get(source_id).map_or(true, |s| s.enabled)
    }

    /// Get the path a source reads from: configured, or derived from claude_dir
    pub fn source_path(&self, source_id: &str) -> PathBuf {
        if let Some(path) = self.sources.get(source_id).and_then(|s| s.path.as_ref()) {
            return expand(path);
        }
        let root = self.claude_dir();
        match source_id {
            "history" => root.join("history.jsonl"),
            "facet" => root.join("usage-data").join("facets"),
            "stats" => root.join("stats-cache.json"),
            // index and transcript both live under the projects tree
            _ => root.join("projects"),
        }
    }
}
