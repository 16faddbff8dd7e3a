#![cfg(unix)]

use crate::{IngestorConfig, IngestorError, Ingestors};
use benchlog_history::Measurement;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

fn shell(script: &str, timeout: u64) -> Ingestors {
    Ingestors::load(&IngestorConfig::Exec {
        exec: "/bin/sh".into(),
        params: vec!["-c".to_owned(), script.to_owned()],
        timeout,
    })
}

#[test]
pub fn converter_output_is_read() {
    let ingestor = shell("cat", 5000);
    let output = "- name: features/10\n  value: 861344401.5\n  unit: ns\n";

    assert_eq!(
        ingestor.ingest(output).unwrap(),
        vec![Measurement::new("features/10", 861344401.5, "ns")]
    );
    assert_eq!(ingestor.tool(), "customSmallerIsBetter");
}

#[test]
pub fn failing_converter_is_reported() {
    match shell("echo broken >&2; exit 3", 5000).ingest("") {
        Err(IngestorError::ChildFailed { stderr, .. }) => assert_eq!(stderr.trim(), "broken"),
        other => panic!("expected a failed child, got {other:?}"),
    }
}

#[test]
pub fn slow_converter_times_out() {
    assert!(matches!(
        shell("sleep 5", 100).ingest(""),
        Err(IngestorError::ChildTimeout)
    ));
}

#[test]
pub fn missing_converter_fails_to_spawn() {
    let ingestor = Ingestors::load(&IngestorConfig::Exec {
        exec: "/nonexistent/converter".into(),
        params: Vec::new(),
        timeout: 100,
    });

    assert!(matches!(
        ingestor.ingest(""),
        Err(IngestorError::SpawnIngestor(_))
    ));
}

#[test]
pub fn default_timeout_applies() {
    let config: IngestorConfig = serde_yaml::from_str("name: exec\nexec: /bin/cat\n").unwrap();

    assert_eq!(
        config,
        IngestorConfig::Exec {
            exec: "/bin/cat".into(),
            params: Vec::new(),
            timeout: 2000,
        }
    );
}

#[test]
pub fn timeout_holds_while_converter_ignores_stdin() {
    let started = Instant::now();
    let result = shell("sleep 3", 100).ingest(&"x".repeat(1 << 20));

    assert!(matches!(result, Err(IngestorError::ChildTimeout)), "{result:?}");
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[test]
pub fn unread_input_is_not_an_error() {
    let ingestor = shell("echo '- {name: x, value: 1, unit: ns}'", 5000);

    assert_eq!(
        ingestor.ingest(&"x".repeat(1 << 20)).unwrap(),
        vec![Measurement::new("x", 1.0, "ns")]
    );
}

#[test]
pub fn panicked_pipe_thread_is_reported() {
    let worker = std::thread::spawn(|| -> std::io::Result<String> { panic!("reader died") });

    assert!(matches!(
        crate::exec::join(Some(worker)),
        Err(IngestorError::ChildError(_))
    ));
}
