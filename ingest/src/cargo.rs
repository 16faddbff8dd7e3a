use crate::IngestorError;
use benchlog_history::Measurement;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

// e.g. `test bench_fib_20 ... bench:      31,520 ns/iter (+/- 1,052)`
static BENCH_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^test (?P<name>\S+)\s+\.\.\. bench:\s+(?P<value>[0-9][0-9,.]*) (?P<unit>\S+)(?: \(\+/- (?P<range>[0-9][0-9,.]*)\))?",
    )
    .expect("bench line pattern is valid")
});

fn number(text: &str) -> Option<f64> {
    text.replace(',', "").parse().ok()
}

/// Read the libtest bench lines printed by `cargo bench`
pub fn ingest(output: &str) -> Result<Vec<Measurement>, IngestorError> {
    let mut measurements = Vec::new();

    for line in output.lines() {
        let Some(captures) = BENCH_LINE.captures(line.trim_end()) else {
            continue;
        };

        let Some(value) = number(&captures["value"]) else {
            warn!(line = line, "Skipping bench line with an unreadable value");
            continue;
        };

        let measurement = Measurement::new(&captures["name"], value, &captures["unit"]);

        measurements.push(match captures.name("range") {
            Some(range) => measurement.with_range(format!("± {}", range.as_str())),
            None => measurement,
        });
    }

    Ok(measurements)
}
