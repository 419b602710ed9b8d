//! Line ownership at one or many revisions.

use crate::aggregate::{group_and_sum, pivot_with_columns, rank, RankSpec};
use crate::cancel::AbortHandle;
use crate::error::{Result, Warned, Warning};
use crate::object_id::ObjectId;
use crate::parser::{parse_file_listing, BlameTraceParser};
use crate::record::{AttributionRow, CommitRecord};
use crate::selection::SelectionFilter;
use crate::source::HistorySource;
use crate::storage::HistoryStore;
use crate::table::{Table, Value};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Commit metadata keyed by sha, for joining blame hunks.
#[derive(Debug, Clone, Default)]
pub struct CommitIndex {
    commits: HashMap<ObjectId, CommitRecord>,
}

impl CommitIndex {
    /// Load every ingested commit.
    pub async fn load<H: HistoryStore + ?Sized>(store: &H) -> Result<Self> {
        let commits = store.commits().await?;
        tracing::debug!("Loaded {} commit(s) into the commit index", commits.len());
        Ok(Self::from_commits(commits))
    }

    pub fn from_commits(commits: impl IntoIterator<Item = CommitRecord>) -> Self {
        Self {
            commits: commits.into_iter().map(|c| (c.sha, c)).collect(),
        }
    }

    pub fn get(&self, sha: &ObjectId) -> Option<&CommitRecord> {
        self.commits.get(sha)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Attribution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionOptions {
    /// Worker threads; zero uses the available parallelism.
    pub workers: usize,
    /// Revisions dispatched per round.
    pub batch_size: usize,
    /// Ignore whitespace-only changes when blaming.
    pub ignore_whitespace: bool,
}

impl Default for AttributionOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            batch_size: 16,
            ignore_whitespace: false,
        }
    }
}

impl AttributionOptions {
    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Computes ownership tables from blame traces.
pub struct Attributor<S> {
    source: Arc<S>,
    index: Arc<CommitIndex>,
    filter: SelectionFilter,
    options: AttributionOptions,
    abort: AbortHandle,
}

impl<S: HistorySource> Attributor<S> {
    pub fn new(
        source: Arc<S>,
        index: Arc<CommitIndex>,
        filter: SelectionFilter,
        options: AttributionOptions,
    ) -> Self {
        Self {
            source,
            index,
            filter,
            options,
            abort: AbortHandle::new(),
        }
    }

    /// Share an abort handle; once tripped, undispatched revisions are skipped.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn filter(&self) -> &SelectionFilter {
        &self.filter
    }

    /// Files at `revision` that pass the path rules.
    pub fn tracked_files(&self, revision: &str) -> Result<Vec<String>> {
        let listing = self.source.file_listing(revision)?;
        Ok(parse_file_listing(&listing)?
            .into_iter()
            .map(|entry| entry.path)
            .filter(|path| self.filter.keep_path(path))
            .collect())
    }

    /// Blame hunks at `revision` joined with their commits.
    ///
    /// Hunks whose commit is not in the index are kept unresolved and
    /// reported.
    pub fn hunks_at(&self, revision: &str) -> Result<Warned<Vec<AttributionRow>>> {
        let mut rows = Vec::new();
        let mut warnings = Vec::new();

        for path in self.tracked_files(revision)? {
            let trace = self
                .source
                .blame_stream(revision, &path, self.options.ignore_whitespace)?;
            for hunk in BlameTraceParser.parse(&trace, &path) {
                let commit = self.index.get(&hunk.sha).cloned();
                if commit.is_none() {
                    tracing::warn!(
                        "Commit {} blamed for {} is not ingested; keeping it unresolved",
                        hunk.sha.short(),
                        path
                    );
                    warnings.push(Warning::UnresolvedCommit {
                        sha: hunk.sha.to_hex(),
                        path: path.clone(),
                    });
                }
                rows.push(AttributionRow {
                    revision: revision.to_string(),
                    hunk,
                    commit,
                });
            }
        }

        tracing::debug!("Attributed {} hunk(s) at {}", rows.len(), revision);
        Ok(Warned::new(rows, warnings))
    }

    /// One row per hunk at `revision`, with excluded actors removed and
    /// aliases applied.
    pub fn attribute_at(&self, revision: &str) -> Result<Warned<Table>> {
        let hunks = self.hunks_at(revision)?;
        let table = self.filter.attribution_table(&hunks.value)?;
        Ok(Warned::new(table, hunks.warnings))
    }

    /// Lines owned per actor at `revision`, ranked.
    pub fn ownership_at(&self, revision: &str, spec: &RankSpec) -> Result<Warned<Table>> {
        let mut warnings = Vec::new();
        let table = self.attribute_at(revision)?.drain_into(&mut warnings);
        let grouped = group_and_sum(&table, &[self.filter.actor_key().as_str()], &["line_count"])?;
        let ranked = rank(&grouped, spec).drain_into(&mut warnings);
        Ok(Warned::new(ranked, warnings))
    }

    /// Actor × revision matrix of owned lines.
    ///
    /// Each distinct revision becomes one column, in request order. Revisions
    /// are blamed in parallel rounds of `batch_size`; if the abort handle is
    /// tripped, remaining rounds are skipped and the matrix covers only the
    /// completed revisions.
    pub fn attribute_over_time(&self, revisions: &[String]) -> Result<Warned<Table>> {
        let mut seen = HashSet::new();
        let revisions: Vec<&str> = revisions
            .iter()
            .map(String::as_str)
            .filter(|rev| seen.insert(*rev))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.worker_count())
            .build();
        if let Err(e) = &pool {
            tracing::warn!("Falling back to sequential attribution: {}", e);
        }

        let mut warnings = Vec::new();
        let mut tables = Vec::with_capacity(revisions.len());
        let mut completed = Vec::with_capacity(revisions.len());

        let batch_size = self.options.batch_size.max(1);
        for (round, batch) in revisions.chunks(batch_size).enumerate() {
            if self.abort.is_aborted() {
                let skipped = revisions.len() - round * batch_size;
                tracing::warn!("Attribution aborted, skipping {} revision(s)", skipped);
                warnings.push(Warning::Aborted { skipped });
                break;
            }

            let results: Vec<Result<Warned<Table>>> = match &pool {
                Ok(pool) => pool.install(|| batch.par_iter().map(|rev| self.attribute_at(rev)).collect()),
                Err(_) => batch.iter().map(|rev| self.attribute_at(rev)).collect(),
            };

            for (rev, result) in batch.iter().zip(results) {
                tables.push(result?.drain_into(&mut warnings));
                completed.push(Value::from(*rev));
            }
        }

        let union = Table::concat(AttributionRow::schema(), tables)?;
        let matrix = pivot_with_columns(
            &union,
            &self.filter.actor_key(),
            "revision",
            "line_count",
            &completed,
        )?;
        Ok(Warned::new(matrix, warnings))
    }
}
