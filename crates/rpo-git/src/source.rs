//! [`HistorySource`] over a git repository.

use crate::repository::GitRepository;
use rpo_core::parser::LogFormat;
use rpo_core::{HistorySource, LogQuery, ObjectId, Result};

impl HistorySource for GitRepository {
    fn head(&self) -> Result<ObjectId> {
        Ok(self.head_commit_id()?)
    }

    fn log_stream(&self, query: &LogQuery, format: &LogFormat) -> Result<String> {
        Ok(self.log_numstat(query, format)?)
    }

    fn blame_stream(&self, revision: &str, path: &str, ignore_whitespace: bool) -> Result<String> {
        Ok(self.blame_incremental(revision, path, ignore_whitespace)?)
    }

    fn file_listing(&self, revision: &str) -> Result<String> {
        let files = self.list_files(revision)?;
        Ok(files
            .iter()
            .map(|(blob, path)| format!("{blob} {path}\n"))
            .collect())
    }
}
