//! SQLite storage backend implementation.

use crate::error::{Error, Result, Warned, Warning};
use crate::object_id::ObjectId;
use crate::record::{Changeset, CommitRecord, FileChangeRecord, FileChangeRow, Identity, Timestamp};
use crate::storage::traits::{BatchOutcome, HistoryStore};
use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const COMMIT_COLUMNS: &str = "sha, tree, author_name, author_email, committer_name, committer_email, \
     authored_at, authored_offset_defaulted, committed_at, committed_offset_defaulted";

struct Inner {
    conn: Connection,
    /// Newest ingested sha. `None` until first read or write.
    latest: Option<Option<ObjectId>>,
}

/// SQLite-based history store.
pub struct SqliteHistoryStore {
    inner: Mutex<Inner>,
    destination: String,
}

impl SqliteHistoryStore {
    /// Open (or create) a store at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let destination = path.as_ref().display().to_string();
        let conn = Connection::open(path)?;
        Self::with_connection(conn, destination)
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn with_connection(conn: Connection, destination: String) -> Result<Self> {
        let store = Self {
            inner: Mutex::new(Inner { conn, latest: None }),
            destination,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Where batches are written, for diagnostics.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Persistence(format!("store {} is poisoned", self.destination)))
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let inner = self.lock()?;
        inner.conn.execute_batch(
            r#"
            -- One row per ingested commit, including commits without file changes
            CREATE TABLE IF NOT EXISTS commits (
                seq                         INTEGER PRIMARY KEY AUTOINCREMENT,
                sha                         TEXT NOT NULL,
                tree                        TEXT NOT NULL,
                author_name                 TEXT NOT NULL,
                author_email                TEXT NOT NULL,
                committer_name              TEXT NOT NULL,
                committer_email             TEXT NOT NULL,
                authored_at                 TEXT NOT NULL,
                authored_offset_defaulted   INTEGER NOT NULL,
                committed_at                TEXT NOT NULL,
                committed_offset_defaulted  INTEGER NOT NULL,
                ingested_at                 TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_commits_sha ON commits(sha);

            -- File changes, denormalized with their commit
            CREATE TABLE IF NOT EXISTS file_changes (
                id                          INTEGER PRIMARY KEY AUTOINCREMENT,
                sha                         TEXT NOT NULL,
                tree                        TEXT NOT NULL,
                author_name                 TEXT NOT NULL,
                author_email                TEXT NOT NULL,
                committer_name              TEXT NOT NULL,
                committer_email             TEXT NOT NULL,
                authored_at                 TEXT NOT NULL,
                authored_offset_defaulted   INTEGER NOT NULL,
                committed_at                TEXT NOT NULL,
                committed_offset_defaulted  INTEGER NOT NULL,
                path                        TEXT NOT NULL CHECK (path <> ''),
                insertions                  INTEGER NOT NULL CHECK (insertions >= 0),
                deletions                   INTEGER NOT NULL CHECK (deletions >= 0),
                lines                       INTEGER NOT NULL CHECK (lines = insertions + deletions),
                is_binary                   INTEGER NOT NULL CHECK (is_binary = (lines = 0))
            );

            CREATE INDEX IF NOT EXISTS idx_file_changes_sha ON file_changes(sha);
            CREATE INDEX IF NOT EXISTS idx_file_changes_path ON file_changes(path);
            "#,
        )?;
        Ok(())
    }
}

fn validate_batch(batch: &[Changeset]) -> Result<()> {
    for changeset in batch {
        for change in &changeset.changes {
            if change.sha != changeset.commit.sha {
                return Err(Error::RecordValidation(format!(
                    "{} is filed under commit {} but belongs to {}",
                    change.path, changeset.commit.sha, change.sha
                )));
            }
            change.validate()?;
        }
    }
    Ok(())
}

fn write_batch(conn: &mut Connection, batch: &[Changeset]) -> Result<()> {
    validate_batch(batch)?;

    let tx = conn.transaction()?;
    {
        let mut commit_stmt = tx.prepare(&format!(
            "INSERT INTO commits ({COMMIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ))?;
        let mut change_stmt = tx.prepare(&format!(
            "INSERT INTO file_changes ({COMMIT_COLUMNS}, path, insertions, deletions, lines, is_binary) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ))?;

        for changeset in batch {
            let c = &changeset.commit;
            let sha = c.sha.to_hex();
            let tree = c.tree.to_hex();
            let authored = c.authored.at.to_rfc3339();
            let committed = c.committed.at.to_rfc3339();

            commit_stmt.execute(params![
                sha,
                tree,
                c.author.name,
                c.author.email,
                c.committer.name,
                c.committer.email,
                authored,
                c.authored.offset_defaulted,
                committed,
                c.committed.offset_defaulted,
            ])?;

            for change in &changeset.changes {
                change_stmt.execute(params![
                    sha,
                    tree,
                    c.author.name,
                    c.author.email,
                    c.committer.name,
                    c.committer.email,
                    authored,
                    c.authored.offset_defaulted,
                    committed,
                    c.committed.offset_defaulted,
                    change.path,
                    change.insertions as i64,
                    change.deletions as i64,
                    change.lines as i64,
                    change.is_binary,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn object_id_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ObjectId> {
    let raw: String = row.get(idx)?;
    ObjectId::from_hex(&raw).map_err(|e| conversion_error(idx, e))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    let at = DateTime::parse_from_rfc3339(&raw).map_err(|e| conversion_error(idx, e))?;
    Ok(Timestamp {
        at,
        offset_defaulted: row.get(idx + 1)?,
    })
}

/// Reads the `COMMIT_COLUMNS` prefix of a row.
fn commit_from_row(row: &Row<'_>) -> rusqlite::Result<CommitRecord> {
    Ok(CommitRecord {
        sha: object_id_at(row, 0)?,
        tree: object_id_at(row, 1)?,
        author: Identity {
            name: row.get(2)?,
            email: row.get(3)?,
        },
        committer: Identity {
            name: row.get(4)?,
            email: row.get(5)?,
        },
        authored: timestamp_at(row, 6)?,
        committed: timestamp_at(row, 8)?,
    })
}

fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let n: i64 = row.get(idx)?;
    u64::try_from(n).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn insert_batch(&self, batch: &[Changeset]) -> Result<Warned<BatchOutcome>> {
        let submitted: usize = batch.iter().map(|cs| cs.changes.len()).sum();
        if batch.is_empty() {
            return Ok(Warned::clean(BatchOutcome::default()));
        }

        let mut inner = self.lock()?;
        match write_batch(&mut inner.conn, batch) {
            Ok(()) => {
                inner.latest = Some(batch.last().map(|cs| cs.commit.sha));
                tracing::debug!(
                    "Stored {} commit(s) with {} file change(s) in {}",
                    batch.len(),
                    submitted,
                    self.destination
                );
                Ok(Warned::clean(BatchOutcome {
                    submitted,
                    accepted: submitted,
                    commits: batch.len(),
                }))
            }
            Err(e) => {
                tracing::warn!(
                    "Dropping batch of {} commit(s) bound for {}: {}",
                    batch.len(),
                    self.destination,
                    e
                );
                let warning = Warning::BatchRejected {
                    size: batch.len(),
                    destination: self.destination.clone(),
                    reason: e.to_string(),
                };
                Ok(Warned::new(
                    BatchOutcome {
                        submitted,
                        accepted: 0,
                        commits: 0,
                    },
                    vec![warning],
                ))
            }
        }
    }

    async fn latest_known_sha(&self) -> Result<Option<ObjectId>> {
        let mut inner = self.lock()?;
        if let Some(latest) = inner.latest {
            return Ok(latest);
        }
        let latest = inner
            .conn
            .query_row(
                "SELECT sha FROM commits ORDER BY seq DESC LIMIT 1",
                [],
                |row| object_id_at(row, 0),
            )
            .optional()?;
        inner.latest = Some(latest);
        Ok(latest)
    }

    async fn commits(&self) -> Result<Vec<CommitRecord>> {
        let inner = self.lock()?;
        let mut stmt = inner
            .conn
            .prepare(&format!("SELECT {COMMIT_COLUMNS} FROM commits ORDER BY seq"))?;
        let commits = stmt
            .query_map([], commit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(commits)
    }

    async fn file_changes(&self) -> Result<Vec<FileChangeRow>> {
        let inner = self.lock()?;
        let mut stmt = inner.conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS}, path, insertions, deletions, lines, is_binary \
             FROM file_changes ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                let commit = commit_from_row(row)?;
                let change = FileChangeRecord {
                    sha: commit.sha,
                    path: row.get(10)?,
                    insertions: count_at(row, 11)?,
                    deletions: count_at(row, 12)?,
                    lines: count_at(row, 13)?,
                    is_binary: row.get(14)?,
                };
                Ok(FileChangeRow { commit, change })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn commit_count(&self) -> Result<usize> {
        let inner = self.lock()?;
        let count: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn file_change_count(&self) -> Result<usize> {
        let inner = self.lock()?;
        let count: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM file_changes", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
