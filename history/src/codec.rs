use crate::{document::HistoryDocument, error::ParseError};
use serde::{Deserialize, Serialize};

/// Variable the dashboard page reads the history from
pub const SCRIPT_VARIABLE: &str = "window.BENCHMARK_DATA";

/// Persisted forms of a history document
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `window.BENCHMARK_DATA = {...}`, loadable by the dashboard through a script tag
    #[default]
    Script,
    /// bare JSON object
    Json,
}

impl Format {
    /// Guess the format of persisted source text
    pub fn detect(source: &str) -> Option<Self> {
        let source = source.trim_start_matches('\u{feff}').trim_start();

        if source.starts_with('{') {
            Some(Self::Json)
        } else if source.starts_with(SCRIPT_VARIABLE) {
            Some(Self::Script)
        } else {
            None
        }
    }

    /// Pick the format from a file extension, `.js` being the dashboard's script form
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension {
            Some("json") => Self::Json,
            _ => Self::Script,
        }
    }
}

/// Extract the JSON payload of a `window.BENCHMARK_DATA = ...;` assignment
fn script_payload(source: &str) -> Result<&str, ParseError> {
    source
        .trim()
        .strip_prefix(SCRIPT_VARIABLE)
        .and_then(|rest| rest.trim_start().strip_prefix('='))
        .map(|payload| payload.trim().trim_end_matches(';'))
        .ok_or(ParseError::UnknownFormat)
}

/// Deserialize a document from either persisted form
pub fn load(source: &str) -> Result<HistoryDocument, ParseError> {
    let source = source.trim_start_matches('\u{feff}');
    let payload = match Format::detect(source) {
        Some(Format::Json) => source,
        Some(Format::Script) => script_payload(source)?,
        None => return Err(ParseError::UnknownFormat),
    };

    Ok(serde_json::from_str(payload)?)
}

/// Produce the persisted form of `document`
pub fn serialize(document: &HistoryDocument, format: Format) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string_pretty(document)?;

    Ok(match format {
        Format::Script => format!("{SCRIPT_VARIABLE} = {json}"),
        Format::Json => json,
    })
}
