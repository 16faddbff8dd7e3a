//! Append-only history of benchmark runs, as read by the benchmark dashboard.
//!
//! A [`HistoryDocument`] maps suite names to the chronological list of [`Run`]s recorded for
//! them. Documents are only ever appended to; [`load`] and [`serialize`] convert between the
//! in-memory form and the persisted `data.js`/JSON form.

pub mod codec;
pub mod commit;
pub mod document;
pub mod error;
pub mod measurement;
pub mod shared;


pub use codec::{load, serialize, Format};
pub use commit::{Commit, Identity};
pub use document::{Appended, HistoryDocument, OrderPolicy, Revision, Run, Violation};
pub use error::{HistoryError, ParseError, ValidationError};
pub use measurement::{ExtraBuilder, ExtraFields, Measurement};
pub use shared::SharedHistory;
