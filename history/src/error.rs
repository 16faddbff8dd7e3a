use crate::document::Revision;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to parse benchmark history: {0}")]
    Parse(#[from] ParseError),
    #[error("Rejected run: {0}")]
    Validation(#[from] ValidationError),
    #[error("History moved from {expected} to {found} before the append")]
    StoreConflict { expected: Revision, found: Revision },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed document")]
    Malformed(#[from] serde_json::Error),
    #[error("neither a JSON object nor a `window.BENCHMARK_DATA` assignment")]
    UnknownFormat,
}

/// Reasons a run (or a loaded document) breaks the history invariants
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("suite name is empty")]
    EmptySuite,
    #[error("run has no commit id")]
    MissingCommitId,
    #[error("run has no capture date")]
    MissingDate,
    #[error("run has no tool name")]
    MissingTool,
    #[error("run contains no measurements")]
    EmptyBenches,
    #[error("measurement #{index} has no name")]
    UnnamedMeasurement { index: usize },
    #[error("measurement {name} has no unit")]
    MissingUnit { name: String },
    #[error("measurement {name} has a non-finite value")]
    NonFiniteValue { name: String },
    #[error("measurement {name} appears more than once in the run")]
    DuplicateMeasurement { name: String },
    #[error("commit {commit} is already recorded in {suite} at {recorded}, not at {date}")]
    DuplicateCommit {
        suite: String,
        commit: String,
        recorded: u64,
        date: u64,
    },
    #[error("run dated {date} precedes the latest run of {suite} at {latest}")]
    OutOfOrder { suite: String, date: u64, latest: u64 },
    #[error("lastUpdate {last_update} precedes the run dated {date}")]
    StaleLastUpdate { last_update: u64, date: u64 },
}
