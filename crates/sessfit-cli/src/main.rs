mod commands;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::Commands;
use sessfit_core::config::PipelineConfig;

#[derive(Parser)]
#[command(name = "sessfit")]
#[command(about = "Batch MLE fitting of foraging models to recorded behavioral sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Installs the global subscriber: stderr plus a `run.log` next to the
/// results, so a finished batch leaves its trace with its outputs. A log file
/// that cannot be opened downgrades to stderr only instead of aborting.
fn init_tracing(run_log: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_env("SESSFIT_LOG").unwrap_or_else(|_| "info".into());
    if let Some(parent) = run_log.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    // Tests may initialize tracing multiple times; it's fine once a global
    // subscriber is already installed.
    match std::fs::File::create(run_log) {
        Ok(file) => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(Arc::new(file)))
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(err) => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            eprintln!(
                "could not open {}: {err}; logging to stderr only",
                run_log.display()
            );
        }
    }
    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(cmd) => cmd.execute().await,
        Commands::GenerateJobs(cmd) => cmd.execute().await,
        Commands::Status(cmd) => cmd.execute().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&PipelineConfig::default().results_root.join("run.log"))?;
    run_cli(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["sessfit", "run"]);
        let Commands::Run(cmd) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(cmd.parallel_on_jobs, 0);
        assert_eq!(cmd.debug_mode, 0);
    }

    #[test]
    fn test_cli_parse_run_flags_keep_original_spelling() {
        let cli = Cli::parse_from([
            "sessfit",
            "run",
            "--parallel_on_jobs",
            "1",
            "--debug_mode",
            "1",
        ]);
        let Commands::Run(cmd) = cli.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(cmd.parallel_on_jobs, 1);
        assert_eq!(cmd.debug_mode, 1);
    }

    #[test]
    fn test_cli_parse_generate_jobs() {
        let cli = Cli::parse_from([
            "sessfit",
            "generate-jobs",
            "--sessions",
            "a.json",
            "b.json",
        ]);
        let Commands::GenerateJobs(cmd) = cli.command else {
            panic!("expected the generate-jobs subcommand");
        };
        assert_eq!(cmd.sessions, ["a.json", "b.json"]);
        assert!(cmd.out.is_none());
    }

    #[test]
    fn test_cli_generate_jobs_requires_sessions() {
        assert!(Cli::try_parse_from(["sessfit", "generate-jobs"]).is_err());
    }

    #[test]
    fn test_init_tracing_tolerates_repeat_calls() {
        let dir = std::env::temp_dir().join(format!("sessfit-log-{}", uuid::Uuid::new_v4()));
        let run_log = dir.join("run.log");
        init_tracing(&run_log).expect("first init");
        init_tracing(&run_log).expect("second init");
        assert!(run_log.exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
