use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

/// Git identity as reported by the forge (`username` is absent for unlinked emails)
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Commit a run was measured at
///
/// Field order follows the persisted form so that rewritten documents diff cleanly against the
/// ones produced by the CI job.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub author: Identity,
    pub committer: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    pub id: String,
    pub message: String,
    // keeps the committer's UTC offset
    pub timestamp: DateTime<FixedOffset>,
    pub tree_id: String,
    pub url: Url,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            username: None,
        }
    }

    pub fn with_username(self, username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..self
        }
    }
}

impl Commit {
    /// Short form of the commit id, as shown in dashboard tooltips
    pub fn short_id(&self) -> &str {
        self.id.get(..7).unwrap_or(&self.id)
    }
}
