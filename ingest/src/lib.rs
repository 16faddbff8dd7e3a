//! Converters from benchmark harness output to history measurements.

pub mod cargo;
pub mod custom;
pub mod exec;
pub mod julia;

#[cfg(test)]
mod exec_test;
#[cfg(test)]
mod julia_test;

use benchlog_history::Measurement;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum IngestorError {
    #[error("Failed to spawn ingestor")]
    SpawnIngestor(#[source] std::io::Error),
    #[error("Failed to deserialize ingestor output")]
    DeserializeIngestor(#[from] serde_yaml::Error),
    #[error("Failed to deserialize benchmark output")]
    DeserializeJson(#[from] serde_json::Error),
    #[error("Failed to wait for a child process")]
    ChildError(#[from] std::io::Error),
    #[error("Ingestor timeout")]
    ChildTimeout,
    #[error("Ingestor exited with {status}: {stderr}")]
    ChildFailed { status: String, stderr: String },
    #[error("Unexpected benchmark layout: {0}")]
    Layout(String),
    #[error("Benchmark output contains no measurements")]
    Empty,
}

/// Ingestor selection as written in the runner config
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum IngestorConfig {
    /// BenchmarkTools.jl JSON export of trial estimates
    Julia,
    /// libtest `cargo bench` text output
    Cargo,
    /// JSON list of measurements
    Custom,
    /// external converter reading harness output on stdin
    Exec {
        exec: PathBuf,
        #[serde(default)]
        params: Vec<String>,
        /// in milliseconds
        #[serde(default = "exec::default_timeout")]
        timeout: u64,
    },
}

/// map of suite name -> Ingestor
pub type IngestorMap = BTreeMap<String, Ingestors>;

#[derive(Clone, Debug)]
pub enum Ingestors {
    Julia,
    Cargo,
    Custom,
    Exec(exec::ExecIngestor),
}

impl Ingestors {
    pub fn load(config: &IngestorConfig) -> Self {
        match config {
            IngestorConfig::Julia => Self::Julia,
            IngestorConfig::Cargo => Self::Cargo,
            IngestorConfig::Custom => Self::Custom,
            IngestorConfig::Exec {
                exec,
                params,
                timeout,
            } => Self::Exec(exec::ExecIngestor::new(exec, params, *timeout)),
        }
    }

    /// Tool name recorded on runs produced through this ingestor
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Julia => "julia",
            Self::Cargo => "cargo",
            Self::Custom | Self::Exec(_) => "customSmallerIsBetter",
        }
    }

    #[tracing::instrument(level = "debug", skip(output), fields(bytes = output.len()))]
    pub fn ingest(&self, output: &str) -> Result<Vec<Measurement>, IngestorError> {
        let result = match self {
            Self::Julia => julia::ingest(output),
            Self::Cargo => cargo::ingest(output),
            Self::Custom => custom::ingest(output),
            Self::Exec(ingestor) => ingestor.ingest(output),
        };

        match result {
            Ok(measurements) if measurements.is_empty() => Err(IngestorError::Empty),
            Ok(measurements) => {
                debug!(count = measurements.len(), "Ingested measurements");

                Ok(measurements)
            }
            Err(error) => {
                error!(error = %error, tool = self.tool(), "Failed to ingest benchmark output");

                Err(error)
            }
        }
    }
}
