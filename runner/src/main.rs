mod commands;
mod config;
mod store;

#[cfg(test)]
mod commands_test;
#[cfg(test)]
mod config_test;

use crate::{
    commands::{AppendArgs, CommandError},
    config::{ConfigErrors, RunnerConfig},
};
use benchlog_history::Appended;
use clap::{Parser, Subcommand};
use std::{io, path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_CONFIG: &str = "benchlog.yml";

/// Record benchmark results in the history read by the benchmark dashboard
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// YAML config, `benchlog.yml` is used if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// History file, overrides `store.path`
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty history
    Init {
        #[arg(long)]
        repo_url: Option<Url>,
    },
    /// Ingest benchmark output and append it as a new run
    Append {
        #[arg(short, long)]
        suite: String,
        /// Benchmark harness output
        #[arg(short, long)]
        input: PathBuf,
        /// JSON commit metadata, either a commit or a push event with `head_commit`
        #[arg(long)]
        commit: PathBuf,
        /// Capture time in epoch milliseconds, defaults to now
        #[arg(long)]
        date: Option<u64>,
        /// Tool name recorded on the run
        #[arg(long)]
        tool: Option<String>,
    },
    /// Validate every invariant of the history
    Check,
    /// Print the latest run of every suite
    Show {
        #[arg(short, long)]
        suite: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<RunnerConfig, ConfigErrors> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None if PathBuf::from(DEFAULT_CONFIG).is_file() => {
            RunnerConfig::load(&PathBuf::from(DEFAULT_CONFIG))?
        }
        None => {
            warn!("No config found, using defaults");

            RunnerConfig::default()
        }
    };

    if let Some(data) = &cli.data {
        config.store.path = data.clone();
    }

    if config.preflight_checks() {
        Err(ConfigErrors::Preflight)
    } else {
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<(), CommandError> {
    let config = load_config(&cli)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Init { repo_url } => commands::init(&config, repo_url),
        Commands::Append {
            suite,
            input,
            commit,
            date,
            tool,
        } => {
            let appended = commands::append(
                &config,
                AppendArgs {
                    suite,
                    input,
                    commit,
                    date,
                    tool,
                },
            )?;

            if appended == Appended::AlreadyRecorded {
                info!("Nothing to do, the commit was already recorded");
            }

            Ok(())
        }
        Commands::Check => commands::check(&config, &mut stdout),
        Commands::Show { suite } => commands::show(&config, suite.as_deref(), &mut stdout),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(error = ?error, "{error}");

            ExitCode::FAILURE
        }
    }
}
