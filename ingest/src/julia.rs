//! BenchmarkTools.jl export, as written by
//! `BenchmarkTools.save("output.json", median(results))`.
//!
//! The file is `[metadata, [root_group]]` where every group is `["BenchmarkGroup", {"data":
//! {...}, "tags": [...]}]` and every leaf is `["TrialEstimate", {"time": ..., "gctime": ...,
//! "memory": ..., "allocs": ..., "params": ["Parameters", {...}]}]`.

use crate::IngestorError;
use benchlog_history::{ExtraBuilder, Measurement};
use serde_json::{Map, Value};

const GROUP: &str = "BenchmarkGroup";
const ESTIMATE: &str = "TrialEstimate";

fn layout(message: impl Into<String>) -> IngestorError {
    IngestorError::Layout(message.into())
}

/// Body of a `[tag, {...}]` pair if its tag matches
fn tagged<'a>(node: &'a Value, tag: &str) -> Option<&'a Map<String, Value>> {
    match node.as_array().map(Vec::as_slice) {
        Some([Value::String(name), body]) if name == tag => body.as_object(),
        _ => None,
    }
}

pub fn ingest(output: &str) -> Result<Vec<Measurement>, IngestorError> {
    let json: Value = serde_json::from_str(output)?;
    let root = json
        .get(1)
        .and_then(|groups| groups.get(0))
        .ok_or_else(|| layout("expected `[metadata, [group]]` at the top level"))?;

    let mut measurements = Vec::new();
    collect(root, &mut Vec::new(), &mut measurements)?;

    Ok(measurements)
}

fn collect(
    group: &Value,
    labels: &mut Vec<String>,
    measurements: &mut Vec<Measurement>,
) -> Result<(), IngestorError> {
    let data = tagged(group, GROUP)
        .and_then(|body| body.get("data"))
        .and_then(Value::as_object)
        .ok_or_else(|| layout(format!("`{}` is not a {GROUP}", labels.join("/"))))?;

    for (key, node) in data {
        labels.push(key.clone());

        if tagged(node, GROUP).is_some() {
            collect(node, labels, measurements)?;
        } else if let Some(estimate) = tagged(node, ESTIMATE) {
            measurements.push(measurement(labels.join("/"), estimate)?);
        } else {
            return Err(layout(format!(
                "`{}` is neither a {GROUP} nor a {ESTIMATE}",
                labels.join("/")
            )));
        }

        labels.pop();
    }

    Ok(())
}

fn measurement(name: String, estimate: &Map<String, Value>) -> Result<Measurement, IngestorError> {
    let field = |key: &str| {
        estimate
            .get(key)
            .filter(|value| value.is_number())
            .ok_or_else(|| layout(format!("`{name}` has no numeric `{key}`")))
    };

    let time = field("time")?
        .as_f64()
        .ok_or_else(|| layout(format!("`{name}` has an unreadable `time`")))?;
    let mut extra = ExtraBuilder::new()
        .field("gctime", field("gctime")?)
        .field("memory", field("memory")?)
        .field("allocs", field("allocs")?);

    // params are `["Parameters", {...}]`, only the object is kept
    if let Some(params) = estimate.get("params").and_then(|params| params.get(1)) {
        extra = extra.field("params", serde_json::to_string(params)?);
    }

    Ok(Measurement::new(name, time, "ns").with_extra(extra.build()))
}
