use crate::{
    commands::{self, repository_of, AppendArgs, CommandError},
    config::{ConfigErrors, RunnerConfig, StoreConfig, SuiteConfig},
    store_test::{commit, run},
};
use benchlog_history::{load, serialize, Appended, Format, HistoryDocument};
use benchlog_ingest::IngestorConfig;
use pretty_assertions::assert_eq;
use std::{fs, path::Path};
use tempfile::TempDir;

const OUTPUT: &str = r#"[{"name": "features/10", "value": 861344401.5, "unit": "ns", "extra": "allocs=7063838"}]"#;

fn config(directory: &Path) -> RunnerConfig {
    RunnerConfig {
        store: StoreConfig {
            path: directory.join("dev/bench/data.js"),
            ..StoreConfig::default()
        },
        suites: [(
            "Julia benchmark result".to_owned(),
            SuiteConfig {
                ingest: IngestorConfig::Custom,
                tool: Some("julia".to_owned()),
            },
        )]
        .into_iter()
        .collect(),
    }
}

/// write benchmark output and commit metadata, returning the append arguments
fn inputs(directory: &TempDir, id: &str, date: u64) -> AppendArgs {
    let input = directory.path().join("output.json");
    let commit_path = directory.path().join(format!("{id}.json"));
    fs::write(&input, OUTPUT).unwrap();
    fs::write(&commit_path, serde_json::to_string(&commit(id)).unwrap()).unwrap();

    AppendArgs {
        suite: "Julia benchmark result".to_owned(),
        input,
        commit: commit_path,
        date: Some(date),
        tool: None,
    }
}

#[test]
pub fn commit_metadata_forms() {
    let directory = tempfile::tempdir().unwrap();
    let bare = directory.path().join("bare.json");
    let event = directory.path().join("event.json");
    fs::write(&bare, serde_json::to_string(&commit("abc")).unwrap()).unwrap();
    fs::write(
        &event,
        serde_json::json!({ "ref": "refs/heads/main", "head_commit": commit("def") }).to_string(),
    )
    .unwrap();

    assert_eq!(commands::read_commit(&bare).unwrap(), commit("abc"));
    assert_eq!(commands::read_commit(&event).unwrap(), commit("def"));

    fs::write(&bare, "{}").unwrap();
    assert!(matches!(
        commands::read_commit(&bare),
        Err(CommandError::Commit { .. })
    ));
}

#[test]
pub fn repository_is_derived_from_commit_url() {
    assert_eq!(
        repository_of(&commit("abc")).map(String::from),
        Some("https://github.com/irslushy/Ronin.jl".to_owned())
    );

    let mut detached = commit("abc");
    detached.url = "https://example.com/abc".parse().unwrap();
    assert_eq!(repository_of(&detached), None);
}

#[test]
pub fn first_append_creates_the_history() {
    let directory = tempfile::tempdir().unwrap();
    let config = config(directory.path());

    assert_eq!(
        commands::append(&config, inputs(&directory, "abc", 100)).unwrap(),
        Appended::Recorded { position: 0 }
    );
    assert_eq!(
        commands::append(&config, inputs(&directory, "def", 200)).unwrap(),
        Appended::Recorded { position: 1 }
    );

    let document = load(&fs::read_to_string(&config.store.path).unwrap()).unwrap();
    assert_eq!(document.repo_url().as_str(), "https://github.com/irslushy/Ronin.jl");
    assert_eq!(document.last_update(), 200);

    let latest = document.latest("Julia benchmark result").unwrap();
    assert_eq!(latest.tool, "julia");
    assert_eq!(latest.benches[0].extra_value("allocs"), Some("7063838"));
}

#[test]
pub fn append_to_unknown_suite_fails() {
    let directory = tempfile::tempdir().unwrap();
    let config = config(directory.path());
    let args = AppendArgs {
        suite: "missing".to_owned(),
        ..inputs(&directory, "abc", 100)
    };

    assert!(matches!(
        commands::append(&config, args),
        Err(CommandError::Config(ConfigErrors::UnknownSuite(_)))
    ));
    assert!(!config.store.path.exists());
}

#[test]
pub fn init_needs_a_repository() {
    let directory = tempfile::tempdir().unwrap();
    let config = config(directory.path());

    assert!(matches!(
        commands::init(&config, None),
        Err(CommandError::MissingRepoUrl)
    ));

    commands::init(&config, Some("https://github.com/irslushy/Ronin.jl".parse().unwrap()))
        .unwrap();
    assert!(config.store.path.is_file());
}

#[test]
pub fn check_and_show_report_the_history() {
    let directory = tempfile::tempdir().unwrap();
    let config = config(directory.path());
    commands::append(&config, inputs(&directory, "abc", 1721662693412)).unwrap();

    let mut checked = Vec::new();
    commands::check(&config, &mut checked).unwrap();
    assert!(String::from_utf8(checked).unwrap().ends_with("1 suite(s), 1 run(s), ok\n"));

    let mut shown = Vec::new();
    commands::show(&config, None, &mut shown).unwrap();
    let shown = String::from_utf8(shown).unwrap();
    assert!(shown.contains("Julia benchmark result (1 runs)"));
    assert!(shown.contains("latest: abc \"Update README.md\""));
    assert!(shown.contains("features/10: 861344401.5 ns"));

    assert!(matches!(
        commands::show(&config, Some("missing"), &mut Vec::<u8>::new()),
        Err(CommandError::UnknownSuite(_))
    ));
}

#[test]
pub fn check_reports_violations() {
    let directory = tempfile::tempdir().unwrap();
    let config = config(directory.path());
    commands::init(&config, Some("https://github.com/irslushy/Ronin.jl".parse().unwrap()))
        .unwrap();

    // a hand-edited history with the same commit recorded twice
    let mut persisted = serde_json::to_value(&HistoryDocument::new(
        "https://github.com/irslushy/Ronin.jl".parse().unwrap(),
    ))
    .unwrap();
    persisted["lastUpdate"] = 200.into();
    persisted["entries"]["julia"] =
        serde_json::to_value(vec![run("abc", 100), run("abc", 200)]).unwrap();
    let document: HistoryDocument = serde_json::from_value(persisted).unwrap();
    fs::write(
        &config.store.path,
        serialize(&document, Format::Script).unwrap(),
    )
    .unwrap();

    let mut out = Vec::new();
    assert!(matches!(
        commands::check(&config, &mut out),
        Err(CommandError::Violations(1))
    ));
    assert!(String::from_utf8(out).unwrap().starts_with("julia[1]: commit abc"));
}
