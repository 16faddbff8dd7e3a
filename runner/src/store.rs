use crate::config::StoreConfig;
use benchlog_history::{
    load, serialize, Appended, Format, HistoryDocument, HistoryError, Revision, Run, SharedHistory,
};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("Failed to encode history")]
    Encode(#[from] serde_json::Error),
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),
    #[error("Gave up after {attempts} attempts, other writers kept changing the history")]
    Conflict { attempts: u32 },
}

impl StoreError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug)]
/// History document persisted as a single file, replaced as a whole on every append
pub struct FileStore {
    path: PathBuf,
    format: Format,
    retries: u32,
    history: SharedHistory,
}

impl FileStore {
    /// Open the existing history described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let document = read_document(&config.path)?;
        debug!(path = ?config.path, revision = %document.revision(), "Opened history");

        Ok(Self {
            path: config.path.clone(),
            format: config.format(),
            retries: config.retries,
            history: SharedHistory::new(document, config.order),
        })
    }

    /// Create the empty history for `repo_url`, refusing to overwrite an existing one
    pub fn create(config: &StoreConfig, repo_url: Url) -> Result<Self, StoreError> {
        if config.path.exists() {
            error!(path = ?config.path, "Refusing to overwrite existing history");

            return Err(StoreError::AlreadyExists(config.path.clone()));
        }

        if let Some(parent) = parent(&config.path) {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }

        let document = HistoryDocument::new(repo_url);
        write_document(&config.path, config.format(), &document)?;
        info!(path = ?config.path, "Created empty history");

        Ok(Self {
            path: config.path.clone(),
            format: config.format(),
            retries: config.retries,
            history: SharedHistory::new(document, config.order),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the history from disk
    pub fn read(&self) -> Result<Arc<HistoryDocument>, StoreError> {
        let document = read_document(&self.path)?;
        debug!(path = ?self.path, revision = %document.revision(), "Read history");
        self.history.replace(document);

        Ok(self.history.snapshot())
    }

    /// Last document read or written by this store
    pub fn snapshot(&self) -> Arc<HistoryDocument> {
        self.history.snapshot()
    }

    /// Append `run` to `suite` and persist the result
    ///
    /// Runs the read-append-write cycle optimistically: if another writer replaced the file
    /// since it was read, the cycle starts over, at most `retries` more times.
    #[tracing::instrument(skip(self, run), fields(commit = %run.commit.id, date = run.date))]
    pub fn append(&self, suite: &str, run: Run) -> Result<Appended, StoreError> {
        let attempts = self.retries + 1;

        for attempt in 1..=attempts {
            let base = self.read()?.revision();

            let appended = self.history.append_at(base, suite, run.clone())?;
            if appended == Appended::AlreadyRecorded {
                info!(suite = suite, "Commit is already recorded, history left unchanged");

                return Ok(appended);
            }

            if self.persist(base, &self.history.snapshot())? {
                return Ok(appended);
            }

            warn!(
                attempt = attempt,
                attempts = attempts,
                "History changed while appending, retrying"
            );
        }

        error!(attempts = attempts, "Failed to append, history kept changing");

        Err(StoreError::Conflict { attempts })
    }

    /// Write `document` if the file still holds `base`
    ///
    /// Returns false if another writer replaced the file first.
    pub(crate) fn persist(
        &self,
        base: Revision,
        document: &HistoryDocument,
    ) -> Result<bool, StoreError> {
        let found = read_document(&self.path)?.revision();

        if found != base {
            debug!(base = %base, found = %found, "Persisted history moved on");

            return Ok(false);
        }

        write_document(&self.path, self.format, document)?;

        Ok(true)
    }
}

fn parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

fn read_document(path: &Path) -> Result<HistoryDocument, StoreError> {
    let source = fs::read_to_string(path).map_err(StoreError::io(path))?;

    load(&source).map_err(|error| {
        error!(path = ?path, error = ?error, "Failed to parse history: {error}");

        StoreError::History(error.into())
    })
}

/// Replace the file atomically by renaming a sibling temp file over it
fn write_document(
    path: &Path,
    format: Format,
    document: &HistoryDocument,
) -> Result<(), StoreError> {
    let persisted = serialize(document, format)?;
    let directory = parent(path).unwrap_or_else(|| Path::new("."));

    let mut file = NamedTempFile::new_in(directory).map_err(StoreError::io(directory))?;
    file.write_all(persisted.as_bytes())
        .and_then(|_| file.as_file().sync_all())
        .map_err(StoreError::io(file.path()))?;
    file.persist(path)
        .map_err(|error| StoreError::io(path)(error.error))?;

    info!(path = ?path, revision = %document.revision(), "Wrote history");

    Ok(())
}
