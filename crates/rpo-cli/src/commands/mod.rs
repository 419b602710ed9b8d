//! Command implementations.

pub mod activity;
pub mod blame;
pub mod cumulative;
pub mod ingest;
pub mod revisions;
pub mod summary;

use anyhow::Result;
use colored::Colorize;
use rpo_core::{
    AbortHandle, Attributor, AttributionOptions, CommitIndex, HistoryStore, IngestOptions,
    IngestReport, Ingestor, SelectionFilter, SelectionOptions, SqliteHistoryStore, Table, Warning,
};
use rpo_git::GitRepository;
use std::path::Path;
use std::sync::Arc;

/// State shared by every command.
pub struct Context {
    pub repository: Arc<GitRepository>,
    pub store: SqliteHistoryStore,
    pub options: SelectionOptions,
    pub no_merges: bool,
    pub abort: AbortHandle,
}

impl Context {
    /// Open the repository and its history database.
    pub fn open(repository: &Path, database: &Path, options: SelectionOptions, no_merges: bool) -> Result<Self> {
        // Fail on bad globs before touching the repository.
        SelectionFilter::new(&options)?;

        let repository = GitRepository::open(repository)?;
        let database = repository.root().join(database);
        if let Some(parent) = database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!("Opening history database at {}", database.display());
        let store = SqliteHistoryStore::new(&database)?;

        Ok(Self {
            repository: Arc::new(repository),
            store,
            options,
            no_merges,
            abort: AbortHandle::new(),
        })
    }

    /// Bring the history database up to date with HEAD.
    pub async fn ingest(&self) -> Result<IngestReport> {
        let ingestor = Ingestor::new(IngestOptions {
            no_merges: self.no_merges,
            ..Default::default()
        })?
        .with_abort_handle(self.abort.clone());

        let report = ingestor.run(self.repository.as_ref(), &self.store).await?;
        print_warnings(&report.warnings);
        Ok(report.value)
    }

    /// An attributor over the ingested history.
    pub async fn attributor(&self, options: AttributionOptions) -> Result<Attributor<GitRepository>> {
        let index = CommitIndex::load(&self.store).await?;
        Ok(Attributor::new(
            Arc::clone(&self.repository),
            Arc::new(index),
            SelectionFilter::new(&self.options)?,
            options,
        )
        .with_abort_handle(self.abort.clone()))
    }

    pub async fn file_changes(&self) -> Result<Vec<rpo_core::FileChangeRow>> {
        Ok(self.store.file_changes().await?)
    }
}

pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{} {}", "!".yellow(), warning);
    }
}

pub fn print_table(title: &str, table: &Table) {
    println!("{} {}", "→".blue(), title);
    println!();
    println!("{}", table);
}
