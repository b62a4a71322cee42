//! Collect command implementation

use anyhow::Result;
use std::path::Path;

use crate::pipeline;
use crate::Config;

pub async fn run(config: &Config, stdout: bool) -> Result<()> {
    let report = pipeline::run(config).await?;

    if stdout {
        println!("{}", report.to_json_pretty()?);
        return Ok(());
    }

    let output = config.output_path();
    report.write_to(&output)?;
    print_outcome(&output, &report);
    Ok(())
}

fn print_outcome(output: &Path, report: &crate::Report) {
    println!(
        "Collected {} sessions across {} projects ({} hours, {} commits)",
        report.total_sessions_found,
        report.total_projects,
        report.total_hours,
        report.total_git_commits,
    );
    println!(
        "   {} transcript-verified, {} with facets",
        report.message_accounting.transcript_verified_sessions,
        report.sessions_with_facets,
    );
    println!("✅ Report written to {}", output.display());
}
