use crate::config::{RunnerConfig, StoreConfig};
use benchlog_history::{Format, OrderPolicy};
use benchlog_ingest::IngestorConfig;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

const CONFIG: &str = r#"
store:
  path: dev/bench/data.js
  order: reject
  retries: 5
  repo_url: https://github.com/irslushy/Ronin.jl
suites:
  Julia benchmark result:
    ingest:
      name: julia
  micro:
    ingest:
      name: cargo
    tool: cargo
"#;

#[test]
pub fn full_config_is_read() {
    let config: RunnerConfig = serde_yaml::from_str(CONFIG).unwrap();

    assert_eq!(config.store.path, PathBuf::from("dev/bench/data.js"));
    assert_eq!(config.store.order, OrderPolicy::Reject);
    assert_eq!(config.store.retries, 5);
    assert_eq!(config.store.format(), Format::Script);
    assert_eq!(
        config.store.repo_url.as_ref().map(|url| url.as_str()),
        Some("https://github.com/irslushy/Ronin.jl")
    );
    assert_eq!(
        config.suites["Julia benchmark result"].ingest,
        IngestorConfig::Julia
    );
    assert_eq!(config.suites["micro"].tool.as_deref(), Some("cargo"));

    let ingestors = config.load_ingestors();
    assert_eq!(ingestors["Julia benchmark result"].tool(), "julia");
    assert!(config.suite("missing").is_err());
}

#[test]
pub fn defaults_apply() {
    let config: RunnerConfig = serde_yaml::from_str("suites: {}").unwrap();

    assert_eq!(config.store.path, PathBuf::from("dev/bench/data.js"));
    assert_eq!(config.store.order, OrderPolicy::Warn);
    assert_eq!(config.store.retries, 3);
    assert!(config.store.repo_url.is_none());
    assert!(!config.preflight_checks());
}

#[test]
pub fn format_follows_extension_unless_set() {
    let json = StoreConfig {
        path: PathBuf::from("history.json"),
        ..StoreConfig::default()
    };
    assert_eq!(json.format(), Format::Json);

    let forced = StoreConfig {
        format: Some(Format::Script),
        ..json
    };
    assert_eq!(forced.format(), Format::Script);
}

#[test]
pub fn unknown_fields_are_rejected() {
    assert!(serde_yaml::from_str::<RunnerConfig>("store:\n  pth: data.js\n").is_err());
    assert!(serde_yaml::from_str::<RunnerConfig>("suites:\n  x:\n    ingest:\n      name: rust\n").is_err());
}

#[test]
pub fn preflight_catches_broken_exec_ingestors() {
    let config: RunnerConfig = serde_yaml::from_str(
        "suites:\n  custom:\n    ingest:\n      name: exec\n      exec: /nonexistent/converter\n      timeout: 0\n    tool: ''\n",
    )
    .unwrap();

    assert!(config.preflight_checks());
}
