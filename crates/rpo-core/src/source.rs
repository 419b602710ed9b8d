//! The seam to the external version-control tool.

use crate::error::Result;
use crate::object_id::ObjectId;
use crate::parser::LogFormat;

/// Which part of the history a log stream covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogQuery {
    /// Only commits after this one; everything reachable from HEAD when unset.
    pub since: Option<ObjectId>,
    /// Leave out merge commits.
    pub no_merges: bool,
}

/// Raw text streams from a repository.
///
/// Implementations are called from worker threads, so every method must be
/// safe to run concurrently.
pub trait HistorySource: Send + Sync {
    /// The commit HEAD points at.
    fn head(&self) -> Result<ObjectId>;

    /// Newest-first commit log with per-file numstat lines, headers shaped
    /// by `format`.
    fn log_stream(&self, query: &LogQuery, format: &LogFormat) -> Result<String>;

    /// Incremental blame of `path` at `revision`.
    fn blame_stream(&self, revision: &str, path: &str, ignore_whitespace: bool) -> Result<String>;

    /// `<blob id> <path>` lines for every file tracked at `revision`.
    fn file_listing(&self, revision: &str) -> Result<String>;
}
