use crate::error::ValidationError;
use itertools::Itertools;
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt::Display, str::Lines};

/// A single named, unit-tagged result within a run
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Measurement {
    /// hierarchical case name, e.g. `group/parameter`
    pub name: String,
    #[serde(serialize_with = "integral_as_integer")]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    pub unit: String,
    /// opaque `key=value` lines with auxiliary metrics and harness parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            range: None,
            unit: unit.into(),
            extra: None,
        }
    }

    pub fn with_range(self, range: impl Into<String>) -> Self {
        Self {
            range: Some(range.into()),
            ..self
        }
    }

    pub fn with_extra(self, extra: impl Into<String>) -> Self {
        Self {
            extra: Some(extra.into()),
            ..self
        }
    }

    /// Iterate over the `key=value` lines of `extra` in their recorded order
    pub fn extra_fields(&self) -> ExtraFields<'_> {
        ExtraFields {
            lines: self.extra.as_deref().unwrap_or_default().lines(),
        }
    }

    /// Look up a single auxiliary metric, e.g. `memory`
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra_fields()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            Err(ValidationError::UnnamedMeasurement { index })
        } else if self.unit.is_empty() {
            Err(ValidationError::MissingUnit {
                name: self.name.clone(),
            })
        } else if !self.value.is_finite() {
            Err(ValidationError::NonFiniteValue {
                name: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

/// Largest magnitude below which every integral `f64` is exactly representable as `i64`
const EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Write whole values without a fraction, the way the dashboard's own JSON output does
fn integral_as_integer<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() && value.fract() == 0.0 && value.abs() < EXACT_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Ordered view over the `key=value` lines of a measurement's `extra` text
///
/// Lines without a `=` are yielded as a key with an empty value, blank lines are skipped.
#[derive(Debug, Clone)]
pub struct ExtraFields<'a> {
    lines: Lines<'a>,
}

impl<'a> Iterator for ExtraFields<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.lines
            .by_ref()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.split_once('=').unwrap_or((line, "")))
    }
}

/// Renders auxiliary metrics into the `extra` text layout
#[derive(Debug, Clone, Default)]
pub struct ExtraBuilder {
    fields: Vec<(String, String)>,
}

impl ExtraBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn build(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .join("\n")
    }
}
