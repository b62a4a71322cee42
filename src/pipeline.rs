//! Run coordinator
//!
//! Readers run first and in parallel; reconciliation, grouping and the
//! rollups only start once every reader has reported back. Everything after
//! the join is a single-threaded fold over immutable inputs.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::aggregate::{aggregate_projects, GlobalAggregate};
use crate::error::Result;
use crate::facets::FacetTally;
use crate::group::{group_sessions, ProjectLabeler};
use crate::probe::{ProbeRegistry, SourceSet};
use crate::reconcile::reconcile;
use crate::report::Report;
use crate::Config;

/// Read every configured source and build the report.
pub async fn run(config: &Config) -> Result<Report> {
    info!(claude_dir = %config.claude_dir().display(), "collecting sources");
    let registry = ProbeRegistry::new(config);
    let sources = registry.collect().await?;

    let labeler = ProjectLabeler::new(config.home_dir().as_deref());
    Ok(build_report(&sources, &labeler, Utc::now()))
}

/// Reconcile, group, and aggregate already-collected sources.
pub fn build_report(
    sources: &SourceSet,
    labeler: &ProjectLabeler,
    generated_at: DateTime<Utc>,
) -> Report {
    let sessions = reconcile(sources);
    let projects = aggregate_projects(group_sessions(sessions, labeler));

    let tracking_start = sources.stats.as_ref().and_then(|s| s.tracking_start());
    let global = GlobalAggregate::compute(&projects, tracking_start);
    let facets = FacetTally::from_records(&sources.facets);

    info!(
        sessions = global.total_sessions,
        projects = global.total_projects,
        "report assembled"
    );
    Report::assemble(sources, projects, global, facets, generated_at)
}
