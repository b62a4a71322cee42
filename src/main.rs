use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;
use tracing_subscriber::EnvFilter;

use insightful::cli::{collect, sources, summary};
use insightful::config::Config;
use insightful::probe::ProbeRegistry;

#[derive(Parser)]
#[command(name = "insightful")]
#[command(about = "Reconcile Claude session history into per-project usage insights")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "insightful.yaml")]
    config: String,

    /// Claude data directory (overrides config)
    #[arg(long)]
    claude_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read every source and write the report
    Collect {
        /// Report path (defaults to <claude_dir>/usage-data/insightful-data.json)
        #[arg(short, long)]
        output: Option<String>,

        /// Transcript files scanned concurrently
        #[arg(short, long)]
        workers: Option<usize>,

        /// Print the report instead of writing it
        #[arg(long)]
        stdout: bool,
    },

    /// Show per-project totals
    Summary {
        /// Show at most this many projects
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List configured sources and whether they exist
    Sources,
}

/// `RUST_LOG` wins; otherwise `INSIGHTFUL_DEBUG_LOG` picks debug over info.
fn log_filter(rust_log: Option<&str>, debug_log: Option<&str>) -> EnvFilter {
    if let Some(filter) = rust_log
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
    {
        return filter;
    }
    let debug_enabled = matches!(debug_log, Some("1" | "true" | "TRUE" | "yes" | "YES"));
    EnvFilter::new(if debug_enabled { "debug" } else { "info" })
}

fn init_logging() {
    let rust_log = env::var("RUST_LOG").ok();
    let debug_log = env::var("INSIGHTFUL_DEBUG_LOG").ok();
    let filter = log_filter(rust_log.as_deref(), debug_log.as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = cli.claude_dir {
        config.claude_dir = dir;
    }

    match cli.command {
        Commands::Collect {
            output,
            workers,
            stdout,
        } => {
            if output.is_some() {
                config.output.path = output;
            }
            if let Some(workers) = workers {
                config.scan.workers = workers;
            }
            collect::run(&config, stdout).await?;
        }
        Commands::Summary { limit } => {
            summary::run(&config, limit).await?;
        }
        Commands::Sources => {
            let registry = ProbeRegistry::new(&config);
            sources::run(&registry)?;
        }
    }

    Ok(())
}
