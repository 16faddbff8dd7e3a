use crate::{julia, IngestorError, Ingestors};
use benchlog_history::Measurement;
use pretty_assertions::assert_eq;

const PARAMS: &str = r#"{"gctrial":true,"time_tolerance":0.05,"evals_set":false,"samples":10000,"evals":1,"gcsample":false,"seconds":5,"overhead":0,"memory_tolerance":0.01}"#;

fn estimate(time: f64, gctime: f64) -> String {
    format!(
        r#"["TrialEstimate", {{"allocs": 7063838, "time": {time}, "memory": 555150920, "gctime": {gctime}, "params": ["Parameters", {PARAMS}]}}]"#
    )
}

fn export(data: &str) -> String {
    format!(
        r#"[{{"Julia": "1.10.4", "BenchmarkTools": "1.0.0"}}, [["BenchmarkGroup", {{"data": {data}, "tags": []}}]]]"#
    )
}

#[test]
pub fn nested_groups_become_hierarchical_names() {
    let output = export(&format!(
        r#"{{"features": ["BenchmarkGroup", {{"data": {{"10": {}, "20": {}}}, "tags": []}}], "io": {}}}"#,
        estimate(861344401.5, 14017167.5),
        estimate(1.0e9, 0.0),
        estimate(12.0, 0.0),
    ));

    let measurements = Ingestors::Julia.ingest(&output).unwrap();

    assert_eq!(
        measurements
            .iter()
            .map(|measurement| measurement.name.as_str())
            .collect::<Vec<_>>(),
        vec!["features/10", "features/20", "io"]
    );
    assert_eq!(
        measurements[0],
        Measurement::new("features/10", 861344401.5, "ns").with_extra(format!(
            "gctime=14017167.5\nmemory=555150920\nallocs=7063838\nparams={PARAMS}"
        ))
    );
    assert_eq!(Ingestors::Julia.tool(), "julia");
}

#[test]
pub fn unexpected_nodes_are_reported() {
    let output = export(r#"{"broken": ["Trial", {}]}"#);

    match julia::ingest(&output) {
        Err(IngestorError::Layout(message)) => assert!(message.contains("`broken`")),
        other => panic!("expected a layout error, got {other:?}"),
    }
}

#[test]
pub fn missing_metrics_are_reported() {
    let output = export(r#"{"x": ["TrialEstimate", {"time": 1.0}]}"#);

    assert!(matches!(
        julia::ingest(&output),
        Err(IngestorError::Layout(_))
    ));
}

#[test]
pub fn wrong_top_level_is_reported() {
    assert!(matches!(julia::ingest("{}"), Err(IngestorError::Layout(_))));
    assert!(matches!(
        julia::ingest("not json"),
        Err(IngestorError::DeserializeJson(_))
    ));
}

#[test]
pub fn empty_export_has_no_measurements() {
    assert!(matches!(
        Ingestors::Julia.ingest(&export("{}")),
        Err(IngestorError::Empty)
    ));
}
