//! Test utilities for rpo.
//!
//! Provides record builders and an in-memory [`HistorySource`].

use crate::cancel::AbortHandle;
use crate::error::{Error, Result};
use crate::object_id::ObjectId;
use crate::parser::LogFormat;
use crate::record::{Changeset, CommitRecord, FileChangeRecord, Identity, Timestamp};
use crate::source::{HistorySource, LogQuery};
use std::collections::HashMap;

const DEFAULT_TIME: &str = "2025-06-22T10:23:45+00:00";

/// An object id made of one repeated hex digit.
pub fn sha(c: char) -> ObjectId {
    ObjectId::from_hex(&c.to_string().repeat(40)).unwrap()
}

/// A commit authored and committed by the same person.
pub fn commit(c: char, name: &str, email: &str) -> CommitRecord {
    let at = Timestamp::parse(DEFAULT_TIME).unwrap();
    CommitRecord {
        sha: sha(c),
        author: Identity::new(name, email),
        committer: Identity::new(name, email),
        authored: at,
        committed: at,
        tree: sha('0'),
    }
}

/// A commit at a given time.
pub fn commit_at(c: char, time: &str) -> CommitRecord {
    let at = Timestamp::parse(time).unwrap();
    CommitRecord {
        authored: at,
        committed: at,
        ..commit(c, "Ada", "ada@example.com")
    }
}

/// A changeset with `(path, insertions, deletions)` changes.
pub fn changeset(c: char, name: &str, changes: &[(&str, u64, u64)]) -> Changeset {
    let commit = commit(c, name, &format!("{}@example.com", name.to_lowercase()));
    let changes = changes
        .iter()
        .map(|(path, ins, del)| FileChangeRecord::new(commit.sha, *path, *ins, *del))
        .collect();
    Changeset { commit, changes }
}

/// A header line in the default log format.
pub fn header(c: char, name: &str, time: &str) -> String {
    let email = format!("{}@example.com", name.to_lowercase());
    render_header(&LogFormat::default(), &sha(c), name, &email, time)
}

fn render_header(format: &LogFormat, sha: &ObjectId, name: &str, email: &str, time: &str) -> String {
    let fields = [
        sha.to_hex(),
        name.to_string(),
        email.to_string(),
        time.to_string(),
        name.to_string(),
        email.to_string(),
        time.to_string(),
        "0".repeat(40),
    ];
    fields.join(&format.delimiter().to_string())
}

/// Render changesets (newest first) as a log stream.
pub fn render_log(format: &LogFormat, history: &[Changeset]) -> String {
    let mut out = String::new();
    for cs in history {
        let c = &cs.commit;
        out.push_str(&render_header(
            format,
            &c.sha,
            &c.author.name,
            &c.author.email,
            &c.authored.at.to_rfc3339(),
        ));
        out.push_str("\n\n");
        for change in &cs.changes {
            if change.is_binary {
                out.push_str(&format!("-\t-\t{}\n", change.path));
            } else {
                out.push_str(&format!("{}\t{}\t{}\n", change.insertions, change.deletions, change.path));
            }
        }
    }
    out
}

#[derive(Debug)]
enum FakeLog {
    History(Vec<Changeset>),
    Raw(String),
}

/// In-memory history source.
#[derive(Debug)]
pub struct FakeSource {
    head: Option<ObjectId>,
    log: FakeLog,
    listings: HashMap<String, Vec<String>>,
    blames: HashMap<(String, String), String>,
    abort_on: Option<(String, AbortHandle)>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self {
            head: None,
            log: FakeLog::History(Vec::new()),
            listings: HashMap::new(),
            blames: HashMap::new(),
            abort_on: None,
        }
    }
}

impl FakeSource {
    /// A source whose log is `history`, newest first.
    pub fn with_history(history: Vec<Changeset>) -> Self {
        Self {
            head: history.first().map(|cs| cs.commit.sha),
            log: FakeLog::History(history),
            ..Default::default()
        }
    }

    /// A source that always returns `text` as its log.
    pub fn with_raw_log(head: ObjectId, text: &str) -> Self {
        Self {
            head: Some(head),
            log: FakeLog::Raw(text.to_string()),
            ..Default::default()
        }
    }

    /// Add a new HEAD commit.
    pub fn push_commit(&mut self, changeset: Changeset) {
        self.head = Some(changeset.commit.sha);
        if let FakeLog::History(history) = &mut self.log {
            history.insert(0, changeset);
        }
    }

    /// Track `path` at `revision` with the given incremental blame.
    pub fn add_file(&mut self, revision: &str, path: &str, blame: &str) {
        self.listings
            .entry(revision.to_string())
            .or_default()
            .push(path.to_string());
        self.blames
            .insert((revision.to_string(), path.to_string()), blame.to_string());
    }
}

impl FakeSource {
    /// Trip `abort` whenever a file at `revision` is blamed.
    pub fn abort_on_blame(&mut self, revision: &str, abort: AbortHandle) {
        self.abort_on = Some((revision.to_string(), abort));
    }
}

impl HistorySource for FakeSource {
    fn head(&self) -> Result<ObjectId> {
        self.head
            .ok_or_else(|| Error::Source("repository has no commits".to_string()))
    }

    fn log_stream(&self, query: &LogQuery, format: &LogFormat) -> Result<String> {
        match &self.log {
            FakeLog::Raw(text) => Ok(text.clone()),
            FakeLog::History(history) => {
                let new: Vec<Changeset> = history
                    .iter()
                    .take_while(|cs| Some(cs.commit.sha) != query.since)
                    .cloned()
                    .collect();
                Ok(render_log(format, &new))
            }
        }
    }

    fn blame_stream(&self, revision: &str, path: &str, _ignore_whitespace: bool) -> Result<String> {
        if let Some((_, abort)) = self.abort_on.as_ref().filter(|(rev, _)| rev == revision) {
            abort.abort();
        }
        self.blames
            .get(&(revision.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| Error::Source(format!("no such path {path} in {revision}")))
    }

    fn file_listing(&self, revision: &str) -> Result<String> {
        let blob = ObjectId::from_bytes([0; 20]);
        Ok(self
            .listings
            .get(revision)
            .map(|paths| {
                paths
                    .iter()
                    .map(|p| format!("{blob} {p}\n"))
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}
