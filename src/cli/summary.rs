//! Summary command implementation

use anyhow::Result;

use crate::pipeline;
use crate::report::Report;
use crate::Config;

const LABEL_WIDTH: usize = 28;
/// Tools named in the totals line
const TOP_TOOLS: usize = 5;

pub async fn run(config: &Config, limit: Option<usize>) -> Result<()> {
    let report = pipeline::run(config).await?;
    print!("{}", render(&report, limit));
    Ok(())
}

fn truncate(label: &str) -> String {
    if label.chars().count() > LABEL_WIDTH {
        let head: String = label.chars().take(LABEL_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        label.to_string()
    }
}

/// Render the per-project table followed by the global totals.
pub fn render(report: &Report, limit: Option<usize>) -> String {
    if report.projects.is_empty() {
        return "No sessions found. Check the claude_dir setting.\n".to_string();
    }

    let mut out = format!(
        "{:<28} {:>8} {:>9} {:>8} {:>8} {:>7}\n",
        "Project", "Sessions", "Messages", "Prompts", "Commits", "Hours"
    );
    out.push_str(&"-".repeat(73));
    out.push('\n');

    let shown = limit.unwrap_or(report.projects.len());
    for project in report.projects.iter().take(shown) {
        let t = project.totals();
        out.push_str(&format!(
            "{:<28} {:>8} {:>9} {:>8} {:>8} {:>7.1}\n",
            truncate(project.label()),
            t.session_count,
            t.total_messages,
            t.total_prompts,
            t.total_git_commits,
            t.total_hours,
        ));
    }
    if report.projects.len() > shown {
        out.push_str(&format!("... and {} more\n", report.projects.len() - shown));
    }

    out.push('\n');
    out.push_str(&format!(
        "{} sessions, {} projects, {:.1} hours, {} commits, {} prompts\n",
        report.total_sessions_found,
        report.total_projects,
        report.total_hours,
        report.total_git_commits,
        report.message_accounting.total_user_prompts,
    ));
    if !report.global_tool_totals.is_empty() {
        let mut tools: Vec<(&str, u64)> = report.global_tool_totals.iter().collect();
        tools.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top: Vec<String> = tools
            .iter()
            .take(TOP_TOOLS)
            .map(|(name, count)| format!("{} {}", name, count))
            .collect();
        out.push_str(&format!(
            "{} tool calls ({})\n",
            report.global_tool_totals.total(),
            top.join(", ")
        ));
    }
    if let Some(start) = &report.message_accounting.tracked_period_start {
        out.push_str(&format!(
            "Tracked since {}: {} messages in {} sessions ({} earlier sessions)\n",
            start,
            report.message_accounting.tracked_messages,
            report.message_accounting.tracked_sessions,
            report.message_accounting.pre_tracking_sessions,
        ));
    }
    out
}
