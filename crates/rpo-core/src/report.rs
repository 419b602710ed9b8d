//! Activity reports over ingested file changes.

use crate::aggregate::{self, group_and_sum, rank, RankSpec};
use crate::error::{Result, Warned};
use crate::record::FileChangeRow;
use crate::selection::{SelectionFilter, SelectionOptions};
use crate::table::Table;

const ACTIVITY_FIELDS: [&str; 3] = ["insertions", "deletions", "lines"];

/// Builds summary and activity tables with one set of selection options.
#[derive(Debug, Clone)]
pub struct Reporter {
    filter: SelectionFilter,
    spec: RankSpec,
}

impl Reporter {
    pub fn new(options: &SelectionOptions) -> Result<Self> {
        Ok(Self {
            filter: SelectionFilter::new(options)?,
            spec: options.rank_spec(),
        })
    }

    pub fn filter(&self) -> &SelectionFilter {
        &self.filter
    }

    /// The selected file changes, one row each.
    pub fn revisions(&self, rows: &[FileChangeRow]) -> Result<Table> {
        self.filter.file_change_table(rows)
    }

    /// Files, contributors, commits and the first/last commit time.
    pub fn summary(&self, rows: &[FileChangeRow]) -> Result<Table> {
        let selected = self.filter.file_change_table(rows)?;
        aggregate::summary(&selected, &self.filter.actor_key())
    }

    /// Insertions, deletions, lines and net per actor.
    pub fn contributors(&self, rows: &[FileChangeRow]) -> Result<Warned<Table>> {
        let actor_key = self.filter.actor_key();
        self.grouped(rows, &[actor_key.as_str()])
    }

    /// Insertions, deletions, lines and net per file and actor.
    pub fn files(&self, rows: &[FileChangeRow]) -> Result<Warned<Table>> {
        let actor_key = self.filter.actor_key();
        self.grouped(rows, &["path", actor_key.as_str()])
    }

    fn grouped(&self, rows: &[FileChangeRow], keys: &[&str]) -> Result<Warned<Table>> {
        let selected = self.filter.file_change_table(rows)?;
        let grouped = group_and_sum(&selected, keys, &ACTIVITY_FIELDS)?;
        Ok(rank(&grouped, &self.spec))
    }
}
