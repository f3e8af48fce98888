//! git-mediate command-line tool.
//!
//! Identifies the commits responsible for merge conflicts before merging:
//! `git mediate <target-branch>` analyzes the currently checked-out branch
//! against the target and reports which commits on each side caused the
//! divergence, without performing a merge.

mod report;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use git_mediate_core::config::AnalyzeConfig;
use git_mediate_core::engine::AnalysisEngine;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Identify the source of merge conflicts before merging branches.
#[derive(Parser, Debug)]
#[command(
    name = "git-mediate",
    version,
    about = "Identify the commits responsible for merge conflicts before merging"
)]
struct Cli {
    /// The branch to check for conflicts against.
    target: String,

    /// Branch to analyze (defaults to the currently checked-out branch).
    #[arg(short, long)]
    source: Option<String>,

    /// Path inside the repository to analyze.
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit the analysis result as JSON instead of the table report.
    #[arg(long)]
    json: bool,

    /// Show more detailed output (repeat for debug logging).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match AnalyzeConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", style::error(&format!("failed to load configuration file: {e}")));
                return ExitCode::FAILURE;
            }
        },
        None => AnalyzeConfig::default(),
    };

    // Precedence: RUST_LOG, then -v flags, then the config file's level.
    let default_level = match cli.verbose {
        0 => config.analysis.log_level.clone(),
        1 => "info".to_string(),
        _ => "debug".to_string(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AnalyzeConfig) -> Result<()> {
    let engine =
        AnalysisEngine::open(config, &cli.repo).context("failed to open git repository")?;

    let source = match cli.source {
        Some(source) => source,
        None => engine
            .client()
            .current_branch()
            .context("failed to determine the current branch")?,
    };

    println!(
        "Checking for conflicts between {} and {}...",
        style::source_ref(&source),
        style::target_ref(&cli.target)
    );

    let result = engine
        .analyze(&source, &cli.target)
        .await
        .context("analysis failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        report::render(&result);
    }

    Ok(())
}
