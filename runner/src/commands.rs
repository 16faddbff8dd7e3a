use crate::{
    config::{ConfigErrors, RunnerConfig},
    store::{FileStore, StoreError},
};
use benchlog_history::{Appended, Commit, HistoryDocument, Run};
use benchlog_ingest::IngestorError;
use chrono::{TimeZone, Utc};
use itertools::Itertools;
use serde::Deserialize;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ingest(#[from] IngestorError),
    #[error("Failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse commit metadata in {path}")]
    Commit {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No repository url known, pass --repo-url or set store.repo_url")]
    MissingRepoUrl,
    #[error("Suite {0} is not part of the history")]
    UnknownSuite(String),
    #[error("History breaks {0} invariant(s)")]
    Violations(usize),
    #[error("System clock is before the unix epoch")]
    Clock,
    #[error("Failed to write output")]
    Output(#[from] io::Error),
}

/// Arguments of a single append
#[derive(Debug, Clone)]
pub struct AppendArgs {
    pub suite: String,
    pub input: PathBuf,
    pub commit: PathBuf,
    pub date: Option<u64>,
    pub tool: Option<String>,
}

/// Commit metadata is either a bare commit or a push event carrying `head_commit`
#[derive(Deserialize)]
#[serde(untagged)]
enum CommitSource {
    Event { head_commit: Commit },
    Bare(Commit),
}

fn read(path: &Path) -> Result<String, CommandError> {
    fs::read_to_string(path).map_err(|source| CommandError::Read {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_commit(path: &Path) -> Result<Commit, CommandError> {
    match serde_json::from_str(&read(path)?) {
        Ok(CommitSource::Event { head_commit }) => Ok(head_commit),
        Ok(CommitSource::Bare(commit)) => Ok(commit),
        Err(source) => Err(CommandError::Commit {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Repository a commit url points into
///
/// `https://github.com/o/r/commit/<sha>` -> `https://github.com/o/r`
pub fn repository_of(commit: &Commit) -> Option<Url> {
    let segments = commit.url.path_segments()?.collect_vec();
    let position = segments.iter().rposition(|segment| *segment == "commit")?;

    let mut url = commit.url.clone();
    url.set_path(&segments[..position].join("/"));
    url.set_query(None);
    url.set_fragment(None);

    Some(url)
}

fn now_millis() -> Result<u64, CommandError> {
    u64::try_from(Utc::now().timestamp_millis()).map_err(|_| CommandError::Clock)
}

pub fn init(config: &RunnerConfig, repo_url: Option<Url>) -> Result<(), CommandError> {
    let repo_url = repo_url
        .or_else(|| config.store.repo_url.clone())
        .ok_or(CommandError::MissingRepoUrl)?;

    FileStore::create(&config.store, repo_url)?;

    Ok(())
}

#[tracing::instrument(skip(config))]
pub fn append(config: &RunnerConfig, args: AppendArgs) -> Result<Appended, CommandError> {
    let suite = config.suite(&args.suite)?;
    let ingestors = config.load_ingestors();
    let ingestor = ingestors
        .get(&args.suite)
        .ok_or_else(|| ConfigErrors::UnknownSuite(args.suite.clone()))?;

    let benches = ingestor.ingest(&read(&args.input)?)?;
    let commit = read_commit(&args.commit)?;
    let date = match args.date {
        Some(date) => date,
        None => now_millis()?,
    };
    let tool = args
        .tool
        .or_else(|| suite.tool.clone())
        .unwrap_or_else(|| ingestor.tool().to_owned());

    let store = if config.store.path.exists() {
        FileStore::open(&config.store)?
    } else {
        // the first run creates the history
        let repo_url = config
            .store
            .repo_url
            .clone()
            .or_else(|| repository_of(&commit))
            .ok_or(CommandError::MissingRepoUrl)?;

        FileStore::create(&config.store, repo_url)?
    };

    let appended = store.append(&args.suite, Run::new(commit, date, tool, benches))?;
    info!(path = ?store.path(), suite = %args.suite, "Appended run");

    Ok(appended)
}

pub fn check(config: &RunnerConfig, out: &mut impl Write) -> Result<(), CommandError> {
    let store = FileStore::open(&config.store)?;
    let document = store.snapshot();
    let violations = document.check(config.store.order);

    for violation in violations.iter() {
        error!(
            suite = %violation.suite,
            position = violation.position,
            "Invariant violated: {}",
            violation.error
        );
        writeln!(
            out,
            "{}[{}]: {}",
            violation.suite, violation.position, violation.error
        )?;
    }

    let runs = document.revision().runs;

    if violations.is_empty() {
        writeln!(
            out,
            "{}: {} suite(s), {runs} run(s), ok",
            store.path().to_string_lossy(),
            document.entries().len()
        )?;

        Ok(())
    } else {
        Err(CommandError::Violations(violations.len()))
    }
}

fn format_date(date: u64) -> String {
    i64::try_from(date)
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .map(|date| date.to_rfc3339())
        .unwrap_or_else(|| date.to_string())
}

fn show_suite(out: &mut impl Write, name: &str, runs: &[Run]) -> io::Result<()> {
    writeln!(out, "{name} ({} runs)", runs.len())?;

    if let Some(latest) = runs.last() {
        writeln!(
            out,
            "  latest: {} \"{}\" at {} ({})",
            latest.commit.short_id(),
            latest.commit.message.lines().next().unwrap_or_default(),
            format_date(latest.date),
            latest.tool
        )?;

        for bench in latest.benches.iter() {
            match bench.range.as_deref() {
                Some(range) => writeln!(
                    out,
                    "    {}: {} {} ({range})",
                    bench.name, bench.value, bench.unit
                )?,
                None => writeln!(out, "    {}: {} {}", bench.name, bench.value, bench.unit)?,
            }
        }
    }

    Ok(())
}

pub fn show(
    config: &RunnerConfig,
    suite: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let store = FileStore::open(&config.store)?;
    let document: &HistoryDocument = &store.snapshot();

    writeln!(
        out,
        "{} (last update {})",
        document.repo_url(),
        format_date(document.last_update())
    )?;

    match suite {
        Some(name) => {
            let runs = document
                .suite(name)
                .ok_or_else(|| CommandError::UnknownSuite(name.to_owned()))?;

            show_suite(out, name, runs)?;
        }
        None => {
            for (name, runs) in document.suites() {
                show_suite(out, name, runs)?;
            }
        }
    }

    Ok(())
}
