use benchlog_history::{Format, OrderPolicy};
use benchlog_ingest::{IngestorConfig, IngestorMap, Ingestors};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Error,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

// check if a file is executable
pub fn check_executable(path: &Path) -> Result<bool, ConfigErrors> {
    if !path.is_file() {
        Err(ConfigErrors::FileNotFound(path.to_path_buf()))
    } else {
        match File::open(path).map(|file| file.metadata()) {
            Ok(Ok(metadata)) => Ok((metadata.mode() & 0o111) != 0),
            Ok(Err(e)) | Err(e) => Err(ConfigErrors::MetadataNotFound(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Metadata not found")]
    MetadataNotFound(#[source] Error),
    #[error("Failed to read config")]
    Read(#[from] Error),
    #[error("Config is malformed")]
    Malformed(#[from] serde_yaml::Error),
    #[error("Suite {0} is not configured")]
    UnknownSuite(String),
    #[error("Preflight checks failed, see the log for details")]
    Preflight,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default, alias = "history")]
    pub store: StoreConfig,
    // Suites with the ingestor converting their harness output
    #[serde(default)]
    pub suites: BTreeMap<String, SuiteConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    // guessed from the file extension if absent
    pub format: Option<Format>,
    #[serde(default)]
    pub order: OrderPolicy,
    // number of read-append-write cycles retried after a concurrent writer got in first
    #[serde(default = "default_retries")]
    pub retries: u32,
    pub repo_url: Option<Url>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    pub ingest: IngestorConfig,
    // overrides the tool name reported by the ingestor
    pub tool: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            format: None,
            order: OrderPolicy::default(),
            retries: default_retries(),
            repo_url: None,
        }
    }
}

impl StoreConfig {
    pub fn format(&self) -> Format {
        self.format.unwrap_or_else(|| {
            Format::from_extension(self.path.extension().and_then(|extension| extension.to_str()))
        })
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        if !path.is_file() {
            return Err(ConfigErrors::FileNotFound(path.to_path_buf()));
        }

        let config = serde_yaml::from_str(&fs::read_to_string(path)?)?;
        info!(path = ?path, "Loaded config");

        Ok(config)
    }

    /// load all ingestors
    pub fn load_ingestors(&self) -> IngestorMap {
        self.suites
            .iter()
            .map(|(name, suite)| (name.clone(), Ingestors::load(&suite.ingest)))
            .collect()
    }

    pub fn suite(&self, name: &str) -> Result<&SuiteConfig, ConfigErrors> {
        self.suites.get(name).ok_or_else(|| {
            error!(
                suite = name,
                configured = ?self.suites.keys().collect::<Vec<_>>(),
                "Suite is not configured"
            );

            ConfigErrors::UnknownSuite(name.to_owned())
        })
    }

    pub fn preflight_checks(&self) -> bool {
        // attempt to catch all errors instead of piece-by-piece to make debugging easier for users
        let mut contains_error = false;

        if self.suites.is_empty() {
            warn!("No suite was defined, only `init`, `check` and `show` will work");
        }

        match self.store.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            Some(parent) if parent.exists() && !parent.is_dir() => {
                error!(
                    "store.path is in {}, which is not a directory",
                    parent.to_string_lossy()
                );
                contains_error = true;
            }
            _ => {}
        }

        if self.store.path.is_dir() {
            error!(
                "store.path ({}) is a directory, expected a file",
                self.store.path.to_string_lossy()
            );
            contains_error = true;
        }

        if let Some(format) = self.store.format {
            let guessed = Format::from_extension(
                self.store.path.extension().and_then(|extension| extension.to_str()),
            );

            if format != guessed {
                warn!(
                    "store.format ({format:?}) does not match the extension of {}, the dashboard might not read it",
                    self.store.path.to_string_lossy()
                );
            }
        }

        for (name, suite) in self.suites.iter() {
            if name.trim().is_empty() {
                error!("suites contains an entry with an empty name");
                contains_error = true;
            }

            if let Some(tool) = suite.tool.as_ref().filter(|tool| tool.trim().is_empty()) {
                error!("suites.{name}.tool ({tool:?}) cannot be empty");
                contains_error = true;
            }

            if let IngestorConfig::Exec { exec, timeout, .. } = &suite.ingest {
                if *timeout == 0 {
                    error!("suites.{name}.ingest.timeout cannot be 0");
                    contains_error = true;
                }

                match check_executable(exec) {
                    Ok(true) => {}
                    Ok(false) => {
                        error!(
                            "suites.{name}.ingest.exec ({}) is not executable",
                            exec.to_string_lossy()
                        );
                        contains_error = true;
                    }
                    Err(e) => {
                        error!(
                            "Failed to determine if suites.{name}.ingest.exec ({}) is an executable: {e}",
                            exec.to_string_lossy()
                        );
                        contains_error = true;
                    }
                }
            }
        }

        contains_error
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("dev/bench/data.js")
}

fn default_retries() -> u32 {
    3
}
