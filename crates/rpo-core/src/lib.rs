//! rpo Core Library
//!
//! Repository history analytics: parse commit logs and blame traces, persist
//! commit history, and aggregate it into activity and ownership tables.

pub mod aggregate;
pub mod attribution;
pub mod cadence;
pub mod cancel;
pub mod error;
pub mod ingest;
pub mod object_id;
pub mod parser;
pub mod record;
pub mod report;
pub mod selection;
pub mod source;
pub mod storage;
pub mod table;

#[cfg(test)]
pub mod testutils;

pub use aggregate::{Extreme, RankSpec};
pub use attribution::{AttributionOptions, Attributor, CommitIndex};
pub use cadence::{sample_revisions, Cadence};
pub use cancel::AbortHandle;
pub use error::{Error, Result, Warned, Warning};
pub use ingest::{IngestOptions, IngestReport, Ingestor};
pub use object_id::ObjectId;
pub use record::{
    AttributionRow, Changeset, CommitRecord, FileChangeRecord, FileChangeRow, Identity,
    IdentityField, LineAttributionRecord, Role, Timestamp,
};
pub use report::Reporter;
pub use selection::{SelectionFilter, SelectionOptions};
pub use source::{HistorySource, LogQuery};
pub use storage::{BatchOutcome, HistoryStore, SqliteHistoryStore};
pub use table::{Column, ColumnType, Table, Value};
