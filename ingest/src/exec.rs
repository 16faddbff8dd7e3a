use crate::IngestorError;
use benchlog_history::Measurement;
use std::{
    ffi::OsString,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

pub(crate) fn default_timeout() -> u64 {
    2000
}

/// Ingestor delegating to an external converter
///
/// The harness output is written to the converter's stdin, its stdout must be a YAML (or JSON)
/// list of measurements.
#[derive(Debug, Clone)]
pub struct ExecIngestor {
    pub exec: PathBuf,
    pub params: Vec<OsString>,
    pub timeout: Duration,
}

impl ExecIngestor {
    pub fn new(exec: &Path, params: &[String], timeout: u64) -> Self {
        Self {
            exec: exec.to_path_buf(),
            params: params.iter().map(OsString::from).collect(),
            timeout: Duration::from_millis(timeout),
        }
    }

    #[tracing::instrument(level = "debug", skip(output))]
    pub fn ingest(&self, output: &str) -> Result<Vec<Measurement>, IngestorError> {
        let mut handle = Command::new(&self.exec)
            .args(&self.params)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::piped())
            .spawn()
            .map_err(IngestorError::SpawnIngestor)?;

        // feed and drain all pipes off this thread so the timeout starts counting right away
        // stdin is closed once the writer finishes, giving the ingestor a clear end of input
        let stdin = handle.stdin.take().map(|mut stdin| {
            let input = output.to_owned();
            thread::spawn(move || match stdin.write_all(input.as_bytes()) {
                Err(error) if error.kind() == io::ErrorKind::BrokenPipe => {
                    warn!("Ingestor closed stdin before reading all input");
                    Ok(())
                }
                result => result,
            })
        });
        let stdout = handle.stdout.take().map(|stdout| thread::spawn(move || drain(stdout)));
        let stderr = handle.stderr.take().map(|stderr| thread::spawn(move || drain(stderr)));

        debug!("Ingestor waiting on {}", handle.id());
        let status = match handle.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                debug!("Ingestor ran into timeout, killing it");
                handle.kill()?;
                handle.wait()?;

                return Err(IngestorError::ChildTimeout);
            }
        };

        join(stdin)?;
        let buffer = join(stdout)?;
        let stderr = join(stderr)?;

        if !status.success() {
            error!(status = %status, stderr = %stderr, "Ingestor failed to ingest input");

            return Err(IngestorError::ChildFailed {
                status: status.to_string(),
                stderr,
            });
        }

        debug!("Output from ingestor: {buffer}");

        match serde_yaml::from_str::<Vec<Measurement>>(&buffer) {
            Ok(measurements) => Ok(measurements),
            Err(e) => {
                error!("Ingestor failed to read metrics: {e}");

                Err(e.into())
            }
        }
    }
}

fn drain(mut pipe: impl Read) -> io::Result<String> {
    let mut buffer = String::new();
    pipe.read_to_string(&mut buffer).map(|_| buffer)
}

pub(crate) fn join<T: Default>(
    worker: Option<JoinHandle<io::Result<T>>>,
) -> Result<T, IngestorError> {
    match worker.map(JoinHandle::join) {
        None => Ok(T::default()),
        Some(Ok(result)) => Ok(result?),
        Some(Err(_)) => {
            error!("Ingestor pipe thread panicked");

            Err(IngestorError::ChildError(io::Error::new(
                io::ErrorKind::Other,
                "ingestor pipe thread panicked",
            )))
        }
    }
}
