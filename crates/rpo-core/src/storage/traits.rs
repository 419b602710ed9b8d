//! Storage trait definitions.

use crate::error::{Result, Warned};
use crate::object_id::ObjectId;
use crate::record::{Changeset, CommitRecord, FileChangeRow};
use async_trait::async_trait;
use serde::Serialize;

/// Counts for one `insert_batch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchOutcome {
    /// File-change records submitted.
    pub submitted: usize,
    /// File-change records persisted; less than `submitted` when rejected.
    pub accepted: usize,
    /// Commits persisted.
    pub commits: usize,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.accepted == self.submitted
    }
}

/// Append-only store of ingested history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a batch of changesets, oldest first.
    ///
    /// A batch that fails validation or is refused by the backend is dropped
    /// whole and reported as a warning rather than an error.
    async fn insert_batch(&self, batch: &[Changeset]) -> Result<Warned<BatchOutcome>>;

    /// The most recently ingested commit, if any.
    async fn latest_known_sha(&self) -> Result<Option<ObjectId>>;

    /// All commits, in ingestion order.
    async fn commits(&self) -> Result<Vec<CommitRecord>>;

    /// All file changes joined with their commits, in ingestion order.
    async fn file_changes(&self) -> Result<Vec<FileChangeRow>>;

    async fn commit_count(&self) -> Result<usize>;

    async fn file_change_count(&self) -> Result<usize>;
}
