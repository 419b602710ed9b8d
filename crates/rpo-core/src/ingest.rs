//! Incremental ingestion: log stream → parser → store.

use crate::cancel::AbortHandle;
use crate::error::{Error, Result, Warned};
use crate::object_id::ObjectId;
use crate::parser::{LogFormat, LogRecordParser, StreamOrder};
use crate::source::{HistorySource, LogQuery};
use crate::storage::HistoryStore;
use serde::Serialize;

/// Default number of commits per store batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Ingestion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Commits per `insert_batch` call.
    pub batch_size: usize,
    pub no_merges: bool,
    pub format: LogFormat,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            no_merges: false,
            format: LogFormat::default(),
        }
    }
}

/// What one ingestion pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IngestReport {
    /// Newest commit known before the pass.
    pub since: Option<ObjectId>,
    pub commits_parsed: usize,
    pub commits_inserted: usize,
    /// File-change records handed to the store.
    pub submitted: usize,
    /// File-change records the store accepted.
    pub inserted: usize,
}

/// Runs ingestion passes against a store.
#[derive(Debug, Clone)]
pub struct Ingestor {
    options: IngestOptions,
    abort: AbortHandle,
}

impl Ingestor {
    pub fn new(options: IngestOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".to_string()));
        }
        Ok(Self {
            options,
            abort: AbortHandle::new(),
        })
    }

    /// Share an abort handle; a fatal parse error trips it.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }

    /// Ingest every commit after the newest one already in `store`.
    pub async fn run<S, H>(&self, source: &S, store: &H) -> Result<Warned<IngestReport>>
    where
        S: HistorySource + ?Sized,
        H: HistoryStore + ?Sized,
    {
        let since = store.latest_known_sha().await?;
        let head = source.head()?;
        let mut report = IngestReport {
            since,
            ..Default::default()
        };

        if since == Some(head) {
            tracing::info!("History is up to date at {}", head.short());
            return Ok(Warned::clean(report));
        }

        let query = LogQuery {
            since,
            no_merges: self.options.no_merges,
        };
        let text = source.log_stream(&query, &self.options.format)?;

        let parser = LogRecordParser::new(self.options.format);
        let parsed = match parser.collect(&text, StreamOrder::OldestFirst) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!("Aborting ingestion: {}", e);
                self.abort.abort();
                return Err(e);
            }
        };

        let mut warnings = Vec::new();
        let changesets = parsed.drain_into(&mut warnings);
        report.commits_parsed = changesets.len();

        for batch in changesets.chunks(self.options.batch_size) {
            let outcome = store.insert_batch(batch).await?.drain_into(&mut warnings);
            report.submitted += outcome.submitted;
            report.inserted += outcome.accepted;
            report.commits_inserted += outcome.commits;
        }

        tracing::info!(
            "Ingested {} of {} commit(s), {} of {} file change(s)",
            report.commits_inserted,
            report.commits_parsed,
            report.inserted,
            report.submitted
        );
        Ok(Warned::new(report, warnings))
    }
}
