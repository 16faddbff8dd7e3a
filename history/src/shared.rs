use crate::{
    document::{Appended, HistoryDocument, OrderPolicy, Revision, Run},
    error::HistoryError,
};
use parking_lot::{FairMutex, RwLock};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
/// Thread safe, copy-on-write wrapper over a `HistoryDocument`
///
/// Appends are serialized by a fair mutex and build the next document off to the side, so
/// readers only ever wait for the pointer swap and never observe a half-applied append.
pub struct SharedHistory(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    current: RwLock<Arc<HistoryDocument>>,
    writer: FairMutex<()>,
    policy: OrderPolicy,
}

impl SharedHistory {
    pub fn new(document: HistoryDocument, policy: OrderPolicy) -> Self {
        Self(Arc::new(Inner {
            current: RwLock::new(Arc::new(document)),
            writer: FairMutex::new(()),
            policy,
        }))
    }

    pub fn policy(&self) -> OrderPolicy {
        self.0.policy
    }

    /// Immutable view of the latest document
    pub fn snapshot(&self) -> Arc<HistoryDocument> {
        self.0.current.read().clone()
    }

    pub fn revision(&self) -> Revision {
        self.snapshot().revision()
    }

    /// Swap in a freshly loaded document, e.g. after re-reading it from disk
    pub fn replace(&self, document: HistoryDocument) {
        let _writer = self.0.writer.lock();

        *self.0.current.write() = Arc::new(document);
    }

    /// Append `run` to `suite` regardless of concurrent appends
    pub fn append(&self, suite: &str, run: Run) -> Result<Appended, HistoryError> {
        let _writer = self.0.writer.lock();

        self.apply(suite, run)
    }

    /// Append `run` only if the document is still at `expected`
    pub fn append_at(
        &self,
        expected: Revision,
        suite: &str,
        run: Run,
    ) -> Result<Appended, HistoryError> {
        let _writer = self.0.writer.lock();
        let found = self.revision();

        if found != expected {
            warn!(expected = %expected, found = %found, suite = suite, "Stale append rejected");

            return Err(HistoryError::StoreConflict { expected, found });
        }

        self.apply(suite, run)
    }

    /// must be called with the writer lock held
    fn apply(&self, suite: &str, run: Run) -> Result<Appended, HistoryError> {
        let mut next = HistoryDocument::clone(&self.snapshot());
        let appended = next.append_with(self.0.policy, suite, run)?;

        if let Appended::Recorded { .. } = appended {
            debug!(revision = %next.revision(), "Publishing new history snapshot");

            *self.0.current.write() = Arc::new(next);
        }

        Ok(appended)
    }
}
