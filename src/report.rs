//! Output document
//!
//! Serializes the rollups into the single JSON report. Writing is the one
//! place where failure is fatal: a partial report is never left behind as
//! if it were complete.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::aggregate::{GlobalAggregate, ProjectAggregate};
use crate::error::{InsightError, Result};
use crate::facets::FacetTally;
use crate::model::{format_timestamp, Counts};
use crate::probe::SourceSet;

/// Tracked, pre-tracking and transcript-verified counts, kept separate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageAccounting {
    pub tracked_messages: u64,
    pub tracked_sessions: u64,
    pub tracked_period_start: Option<String>,
    pub pre_tracking_sessions: usize,
    pub pre_tracking_prompts: u64,
    /// Assistant turns before tracking began are not recoverable
    pub pre_tracking_messages_unavailable: bool,
    pub transcript_verified_messages: u64,
    pub transcript_verified_sessions: usize,
    pub total_user_prompts: u64,
}

/// How many records each source contributed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSources {
    pub history_sessions: usize,
    pub history_lines: u64,
    pub indexed_sessions: usize,
    pub transcript_files: usize,
    pub facet_files: usize,
    pub has_stats_cache: bool,
}

impl DataSources {
    pub fn from_sources(sources: &SourceSet) -> Self {
        Self {
            history_sessions: sources.history.sessions.len(),
            history_lines: sources.history.lines_read,
            indexed_sessions: sources.index.len(),
            transcript_files: sources.transcripts.len(),
            facet_files: sources.facets.len(),
            has_stats_cache: sources.stats.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub stats_cache: Option<Value>,
    /// Keyed by project label, in session-count order
    #[serde(serialize_with = "serialize_projects")]
    pub projects: Vec<ProjectAggregate>,
    pub facets_summary: FacetTally,
    pub all_facets: Vec<Value>,
    pub global_tool_totals: Counts,
    pub total_sessions_found: usize,
    pub total_sessions_from_stats: u64,
    pub total_messages_from_stats: u64,
    pub total_projects: usize,
    pub total_git_commits: u64,
    pub total_hours: f64,
    pub sessions_with_facets: usize,
    pub sessions_without_facets: usize,
    pub message_accounting: MessageAccounting,
    pub data_sources: DataSources,
}

/// Emit projects as a JSON object whose key order is the vector order.
#[allow(clippy::ptr_arg)]
fn serialize_projects<S: Serializer>(
    projects: &Vec<ProjectAggregate>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(projects.iter().map(|p| (p.label(), p)))
}

impl Report {
    pub fn assemble(
        sources: &SourceSet,
        projects: Vec<ProjectAggregate>,
        global: GlobalAggregate,
        facets_summary: FacetTally,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let stats = sources.stats.as_ref();
        let tracked_messages = stats.map(|s| s.total_messages()).unwrap_or(0);
        let tracked_sessions = stats.map(|s| s.total_sessions()).unwrap_or(0);
        let facet_count = sources.facets.len();

        Self {
            generated_at: format_timestamp(&generated_at),
            stats_cache: stats.map(|s| s.raw.clone()),
            projects,
            facets_summary,
            all_facets: sources.facets.iter().map(|f| f.data.clone()).collect(),
            global_tool_totals: global.tool_totals,
            total_sessions_found: global.total_sessions,
            total_sessions_from_stats: tracked_sessions,
            total_messages_from_stats: tracked_messages,
            total_projects: global.total_projects,
            total_git_commits: global.total_git_commits,
            total_hours: global.total_hours,
            sessions_with_facets: facet_count,
            sessions_without_facets: global.total_sessions.saturating_sub(facet_count),
            message_accounting: MessageAccounting {
                tracked_messages,
                tracked_sessions,
                tracked_period_start: stats
                    .and_then(|s| s.first_session_date())
                    .map(String::from),
                pre_tracking_sessions: global.pre_tracking_sessions,
                pre_tracking_prompts: global.pre_tracking_prompts,
                pre_tracking_messages_unavailable: true,
                transcript_verified_messages: global.transcript_messages,
                transcript_verified_sessions: global.transcript_sessions,
                total_user_prompts: global.total_prompts,
            },
            data_sources: DataSources::from_sources(sources),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| InsightError::io(format!("creating {}", parent.display()), e))?;
        }

        let file = File::create(path)
            .map_err(|e| InsightError::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .flush()
            .map_err(|e| InsightError::io(format!("writing {}", path.display()), e))?;
        Ok(())
    }
}
