use crate::{commit::Commit, error::ValidationError, measurement::Measurement};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};
use tracing::{debug, info, warn};
use url::Url;

/// suite name -> runs, in display order
pub type Entries = IndexMap<String, Vec<Run>>;

/// One execution of a suite at a given commit
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Run {
    pub commit: Commit,
    /// capture time in epoch milliseconds
    pub date: u64,
    pub tool: String,
    pub benches: Vec<Measurement>,
}

impl Run {
    pub fn new(
        commit: Commit,
        date: u64,
        tool: impl Into<String>,
        benches: Vec<Measurement>,
    ) -> Self {
        Self {
            commit,
            date,
            tool: tool.into(),
            benches,
        }
    }

    /// Check that all required fields are present and every measurement is usable
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.commit.id.is_empty() {
            return Err(ValidationError::MissingCommitId);
        }
        if self.date == 0 {
            return Err(ValidationError::MissingDate);
        }
        if self.tool.is_empty() {
            return Err(ValidationError::MissingTool);
        }
        if self.benches.is_empty() {
            return Err(ValidationError::EmptyBenches);
        }

        let mut names = BTreeSet::new();

        for (index, measurement) in self.benches.iter().enumerate() {
            measurement.validate(index)?;

            if !names.insert(measurement.name.as_str()) {
                return Err(ValidationError::DuplicateMeasurement {
                    name: measurement.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// How appends dated before the latest run of their suite are treated
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderPolicy {
    /// accept the run and log a warning
    #[default]
    Warn,
    /// refuse the run with `ValidationError::OutOfOrder`
    Reject,
}

/// Outcome of a successful append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// run was pushed at `position` of its suite
    Recorded { position: usize },
    /// the same commit was already recorded with the same date, nothing changed
    AlreadyRecorded,
}

/// Identifies a document state, every accepted append strictly increases `runs`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision {
    pub runs: usize,
    pub last_update: u64,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}@{}", self.runs, self.last_update)
    }
}

/// Invariant violation found while checking a whole document
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub suite: String,
    pub position: usize,
    pub error: ValidationError,
}

/// Top-level benchmark history record
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    last_update: u64,
    repo_url: Url,
    #[serde(deserialize_with = "unique_suites")]
    entries: Entries,
}

impl HistoryDocument {
    /// Empty history for `repo_url`, as created before the first run
    pub fn new(repo_url: Url) -> Self {
        Self {
            last_update: 0,
            repo_url,
            entries: Entries::new(),
        }
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    pub fn repo_url(&self) -> &Url {
        &self.repo_url
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn suite(&self, name: &str) -> Option<&[Run]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn suites(&self) -> impl Iterator<Item = (&str, &[Run])> {
        self.entries
            .iter()
            .map(|(name, runs)| (name.as_str(), runs.as_slice()))
    }

    pub fn latest(&self, suite: &str) -> Option<&Run> {
        self.entries.get(suite).and_then(|runs| runs.last())
    }

    pub fn revision(&self) -> Revision {
        Revision {
            runs: self.entries.values().map(Vec::len).sum(),
            last_update: self.last_update,
        }
    }

    /// Append with the default `OrderPolicy::Warn`
    pub fn append(&mut self, suite: &str, run: Run) -> Result<Appended, ValidationError> {
        self.append_with(OrderPolicy::default(), suite, run)
    }

    /// Push `run` to the end of `suite`, creating the suite if it is new
    ///
    /// The document is left untouched whenever an error is returned.
    pub fn append_with(
        &mut self,
        policy: OrderPolicy,
        suite: &str,
        run: Run,
    ) -> Result<Appended, ValidationError> {
        if suite.is_empty() {
            return Err(ValidationError::EmptySuite);
        }

        run.validate()?;

        if let Some(runs) = self.entries.get(suite) {
            if let Some(recorded) = runs.iter().find(|recorded| recorded.commit.id == run.commit.id)
            {
                if recorded.date == run.date {
                    debug!(
                        suite = suite,
                        commit = %run.commit.id,
                        "Commit already recorded, skipping"
                    );

                    return Ok(Appended::AlreadyRecorded);
                }

                return Err(ValidationError::DuplicateCommit {
                    suite: suite.to_owned(),
                    commit: run.commit.id,
                    recorded: recorded.date,
                    date: run.date,
                });
            }

            if let Some(latest) = runs.last().filter(|latest| latest.date > run.date) {
                match policy {
                    OrderPolicy::Reject => {
                        return Err(ValidationError::OutOfOrder {
                            suite: suite.to_owned(),
                            date: run.date,
                            latest: latest.date,
                        })
                    }
                    OrderPolicy::Warn => warn!(
                        suite = suite,
                        date = run.date,
                        latest = latest.date,
                        "Run is dated before the latest run of its suite"
                    ),
                }
            }
        }

        let date = run.date;
        let commit = run.commit.short_id().to_owned();
        let runs = self.entries.entry(suite.to_owned()).or_default();
        runs.push(run);
        self.last_update = self.last_update.max(date);

        let position = runs.len() - 1;
        info!(suite = suite, commit = %commit, position = position, "Recorded run");

        Ok(Appended::Recorded { position })
    }

    /// Check every invariant of a loaded document, reporting all violations at once
    pub fn check(&self, policy: OrderPolicy) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (suite, runs) in self.entries.iter() {
            let mut violation = |position: usize, error: ValidationError| {
                violations.push(Violation {
                    suite: suite.clone(),
                    position,
                    error,
                })
            };

            if suite.is_empty() {
                violation(0, ValidationError::EmptySuite);
            }

            // the first occurrence of a commit is the recorded one
            let mut recorded = HashMap::new();

            for (position, run) in runs.iter().enumerate() {
                if let Err(error) = run.validate() {
                    violation(position, error);
                }

                match recorded.get(run.commit.id.as_str()) {
                    Some(&date) => violation(
                        position,
                        ValidationError::DuplicateCommit {
                            suite: suite.clone(),
                            commit: run.commit.id.clone(),
                            recorded: date,
                            date: run.date,
                        },
                    ),
                    None => {
                        recorded.insert(run.commit.id.as_str(), run.date);
                    }
                }

                if run.date > self.last_update {
                    violation(
                        position,
                        ValidationError::StaleLastUpdate {
                            last_update: self.last_update,
                            date: run.date,
                        },
                    );
                }
            }

            for (position, (previous, run)) in runs.iter().tuple_windows().enumerate() {
                if previous.date > run.date {
                    match policy {
                        OrderPolicy::Reject => violation(
                            position + 1,
                            ValidationError::OutOfOrder {
                                suite: suite.clone(),
                                date: run.date,
                                latest: previous.date,
                            },
                        ),
                        OrderPolicy::Warn => warn!(
                            suite = %suite,
                            position = position + 1,
                            "Run is dated before its predecessor"
                        ),
                    }
                }
            }
        }

        violations.sort_by(|left, right| {
            (left.suite.as_str(), left.position).cmp(&(right.suite.as_str(), right.position))
        });

        violations
    }
}

/// `entries` with duplicate suite names rejected instead of silently merged
fn unique_suites<'de, D>(deserializer: D) -> Result<Entries, D::Error>
where
    D: Deserializer<'de>,
{
    struct SuitesVisitor;

    impl<'de> Visitor<'de> for SuitesVisitor {
        type Value = Entries;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of suite names to lists of runs")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Entries::with_capacity(map.size_hint().unwrap_or(0));

            while let Some((suite, runs)) = map.next_entry::<String, Vec<Run>>()? {
                if entries.contains_key(&suite) {
                    return Err(de::Error::custom(format!("duplicate suite `{suite}`")));
                }

                entries.insert(suite, runs);
            }

            Ok(entries)
        }
    }

    deserializer.deserialize_map(SuitesVisitor)
}
