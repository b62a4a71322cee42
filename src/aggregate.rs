//! Per-project and global rollups
//!
//! Every number here is a pure function of the grouped sessions (plus the
//! stats cutoff for the global pre-tracking figures), so recomputing over the
//! same input always gives the same result.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::group::ProjectBucket;
use crate::model::{serialize_timestamp, Counts, SourceKind, UnifiedSession};

/// Sessions lasting a day or longer are treated as idle, not worked time
pub const MAX_SESSION_MINUTES: i64 = 1440;

/// Minutes a session contributes to worked time; outliers contribute zero.
pub fn countable_minutes(duration_minutes: Option<i64>) -> i64 {
    match duration_minutes {
        Some(minutes) if minutes > 0 && minutes < MAX_SESSION_MINUTES => minutes,
        _ => 0,
    }
}

/// Minutes to hours, rounded to one decimal place.
pub fn minutes_to_hours(minutes: i64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectTotals {
    pub session_count: usize,
    #[serde(serialize_with = "serialize_timestamp")]
    pub first_session: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub last_session: Option<DateTime<Utc>>,
    pub total_messages: u64,
    pub total_output_tokens: u64,
    pub total_prompts: u64,
    pub total_git_commits: u64,
    pub total_hours: f64,
    pub tool_totals: Counts,
    #[serde(skip)]
    pub total_minutes: i64,
}

impl ProjectTotals {
    pub fn from_sessions(sessions: &[UnifiedSession]) -> Self {
        let mut totals = ProjectTotals {
            session_count: sessions.len(),
            first_session: sessions.first().and_then(|s| s.first_timestamp),
            last_session: sessions.last().and_then(|s| s.last_timestamp),
            ..Default::default()
        };

        for session in sessions {
            totals.total_messages += session.total_messages();
            totals.total_output_tokens += session.total_output_tokens;
            totals.total_prompts += session.prompt_count();
            totals.total_git_commits += session.git_commits;
            totals.total_minutes += countable_minutes(session.duration_minutes);
            totals.tool_totals.merge(&session.tools_used);
        }
        totals.total_hours = minutes_to_hours(totals.total_minutes);
        totals
    }
}

/// One project's sessions and the rollups derived from them
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAggregate {
    #[serde(skip)]
    label: String,
    full_path: String,
    sessions: Vec<UnifiedSession>,
    #[serde(flatten)]
    totals: ProjectTotals,
}

impl ProjectAggregate {
    pub fn new(bucket: ProjectBucket) -> Self {
        let totals = ProjectTotals::from_sessions(&bucket.sessions);
        Self {
            label: bucket.label,
            full_path: bucket.full_path,
            sessions: bucket.sessions,
            totals,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sessions(&self) -> &[UnifiedSession] {
        &self.sessions
    }

    pub fn totals(&self) -> &ProjectTotals {
        &self.totals
    }
}

/// Build project aggregates, largest project (by session count) first.
pub fn aggregate_projects(buckets: Vec<ProjectBucket>) -> Vec<ProjectAggregate> {
    let mut projects: Vec<ProjectAggregate> =
        buckets.into_iter().map(ProjectAggregate::new).collect();
    projects.sort_by(|a, b| {
        b.totals
            .session_count
            .cmp(&a.totals.session_count)
            .then_with(|| a.label.cmp(&b.label))
    });
    projects
}

/// Rollups across every project
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalAggregate {
    pub tool_totals: Counts,
    pub total_sessions: usize,
    pub total_projects: usize,
    pub total_git_commits: u64,
    pub total_minutes: i64,
    pub total_hours: f64,
    pub total_prompts: u64,
    /// Sessions whose skeleton came from a transcript scan
    pub transcript_sessions: usize,
    /// Messages counted in those sessions only; a lower bound on the truth
    pub transcript_messages: u64,
    pub pre_tracking_sessions: usize,
    pub pre_tracking_prompts: u64,
}

impl GlobalAggregate {
    /// `tracking_start` is the stats source's first tracked date. Without it
    /// the pre-tracking figures stay zero.
    pub fn compute(projects: &[ProjectAggregate], tracking_start: Option<DateTime<Utc>>) -> Self {
        let mut global = GlobalAggregate {
            total_projects: projects.len(),
            ..Default::default()
        };

        for project in projects {
            let totals = project.totals();
            global.total_sessions += totals.session_count;
            global.total_git_commits += totals.total_git_commits;
            global.total_minutes += totals.total_minutes;
            global.tool_totals.merge(&totals.tool_totals);

            for session in project.sessions() {
                global.total_prompts += session.prompt_count();

                if session.source == SourceKind::Transcript {
                    global.transcript_sessions += 1;
                    global.transcript_messages += session.total_messages();
                }

                let predates = match (tracking_start, session.first_timestamp) {
                    (Some(cutoff), Some(first)) => first < cutoff,
                    _ => false,
                };
                if predates {
                    global.pre_tracking_sessions += 1;
                    global.pre_tracking_prompts += session.prompt_count();
                }
            }
        }

        global.total_hours = minutes_to_hours(global.total_minutes);
        global
    }
}
