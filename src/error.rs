//! Fatal error types
//!
//! Unreadable sources are not errors (they degrade to empty mappings), so
//! this only covers what should stop a run: bad configuration, a reader task
//! that never finished, and failures writing the report.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Configuration file malformed: {}: {source}", .path.display())]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source reader '{source_id}' did not complete: {source}")]
    ReaderTask {
        source_id: String,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl InsightError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        InsightError::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
