//! Commit, file-change and line-attribution records.

use crate::error::{Error, Result};
use crate::object_id::ObjectId;
use crate::table::{Column, ColumnType, Value};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of a commit an actor is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Author,
    Committer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Committer => "committer",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "author" => Ok(Role::Author),
            "committer" => Ok(Role::Committer),
            other => Err(Error::Configuration(format!(
                "must aggregate by `author` or `committer`, got {other:?}"
            ))),
        }
    }
}

/// Which field of an identity names an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityField {
    #[default]
    Name,
    Email,
}

impl IdentityField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::Name => "name",
            IdentityField::Email => "email",
        }
    }
}

impl FromStr for IdentityField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(IdentityField::Name),
            "email" => Ok(IdentityField::Email),
            other => Err(Error::Configuration(format!(
                "must identify actors by `name` or `email`, got {other:?}"
            ))),
        }
    }
}

/// Column name for an actor field, e.g. `author_email`.
pub fn actor_column(role: Role, field: IdentityField) -> String {
    format!("{}_{}", role.as_str(), field.as_str())
}

/// A person as recorded on a commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    /// Always lower case.
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl AsRef<str>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.as_ref().trim().to_lowercase(),
        }
    }

    pub fn field(&self, field: IdentityField) -> &str {
        match field {
            IdentityField::Name => &self.name,
            IdentityField::Email => &self.email,
        }
    }

    /// Replace one field, leaving the other untouched.
    pub fn with_field(mut self, field: IdentityField, value: String) -> Self {
        match field {
            IdentityField::Name => self.name = value,
            IdentityField::Email => self.email = value,
        }
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// A point in time with the UTC offset it was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub at: DateTime<FixedOffset>,
    /// The source offset could not be read and UTC was substituted.
    pub offset_defaulted: bool,
}

impl Timestamp {
    pub fn new(at: DateTime<FixedOffset>) -> Self {
        Self {
            at,
            offset_defaulted: false,
        }
    }

    /// Parse a timestamp permissively.
    ///
    /// Accepts strict ISO 8601 (`2025-06-22T10:23:45-04:00`) and git's
    /// `2025-06-22 10:23:45 -0400`. When only the offset is unreadable the
    /// wall-clock part is taken as UTC and the result is flagged.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self::new(at));
        }
        if let Ok(at) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
            return Some(Self::new(at));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok((naive, _)) = NaiveDateTime::parse_and_remainder(raw, fmt) {
                return Some(Self {
                    at: naive.and_utc().fixed_offset(),
                    offset_defaulted: true,
                });
            }
        }
        None
    }
}

/// One commit from the log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: ObjectId,
    pub author: Identity,
    pub committer: Identity,
    pub authored: Timestamp,
    pub committed: Timestamp,
    pub tree: ObjectId,
}

impl CommitRecord {
    pub fn identity(&self, role: Role) -> &Identity {
        match role {
            Role::Author => &self.author,
            Role::Committer => &self.committer,
        }
    }

    pub fn timestamp(&self, role: Role) -> &Timestamp {
        match role {
            Role::Author => &self.authored,
            Role::Committer => &self.committed,
        }
    }

    /// Either timestamp fell back to UTC.
    pub fn has_defaulted_offset(&self) -> bool {
        self.authored.offset_defaulted || self.committed.offset_defaulted
    }
}

/// Per-file numeric change stats for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeRecord {
    pub sha: ObjectId,
    pub path: String,
    pub insertions: u64,
    pub deletions: u64,
    pub lines: u64,
    pub is_binary: bool,
}

impl FileChangeRecord {
    /// Build a record, deriving `lines` and `is_binary` from the counts.
    pub fn new(sha: ObjectId, path: impl Into<String>, insertions: u64, deletions: u64) -> Self {
        let lines = insertions + deletions;
        Self {
            sha,
            path: path.into(),
            insertions,
            deletions,
            lines,
            is_binary: lines == 0,
        }
    }

    /// A change the tool reported without numeric stats.
    pub fn binary(sha: ObjectId, path: impl Into<String>) -> Self {
        Self::new(sha, path, 0, 0)
    }

    /// Check the data-model invariants.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::RecordValidation(format!(
                "file change in {} has an empty path",
                self.sha
            )));
        }
        if self.lines != self.insertions + self.deletions {
            return Err(Error::RecordValidation(format!(
                "{} in {}: lines {} != insertions {} + deletions {}",
                self.path, self.sha, self.lines, self.insertions, self.deletions
            )));
        }
        if self.is_binary != (self.lines == 0) {
            return Err(Error::RecordValidation(format!(
                "{} in {}: binary flag disagrees with {} changed line(s)",
                self.path, self.sha, self.lines
            )));
        }
        Ok(())
    }
}

/// A commit and the files it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub commit: CommitRecord,
    pub changes: Vec<FileChangeRecord>,
}

impl Changeset {
    pub fn new(commit: CommitRecord) -> Self {
        Self {
            commit,
            changes: Vec::new(),
        }
    }

    pub fn insertions(&self) -> u64 {
        self.changes.iter().map(|c| c.insertions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.changes.iter().map(|c| c.deletions).sum()
    }

    pub fn lines(&self) -> u64 {
        self.changes.iter().map(|c| c.lines).sum()
    }

    /// Denormalized rows, one per file change.
    pub fn rows(&self) -> impl Iterator<Item = FileChangeRow> + '_ {
        self.changes.iter().map(|change| FileChangeRow {
            commit: self.commit.clone(),
            change: change.clone(),
        })
    }
}

/// A contiguous run of lines owned by one commit at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAttributionRecord {
    pub sha: ObjectId,
    pub path: String,
    pub old_start: u64,
    pub new_start: u64,
    pub line_count: u64,
}

/// A file change joined with its commit, the shape rows are stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChangeRow {
    pub commit: CommitRecord,
    pub change: FileChangeRecord,
}

impl FileChangeRow {
    pub fn schema() -> Vec<Column> {
        let mut columns = vec![Column::new("sha", ColumnType::Str)];
        columns.extend(actor_columns());
        columns.extend([
            Column::new("path", ColumnType::Str),
            Column::new("insertions", ColumnType::Int),
            Column::new("deletions", ColumnType::Int),
            Column::new("lines", ColumnType::Int),
            Column::new("is_binary", ColumnType::Bool),
        ]);
        columns
    }

    /// Row values, with the actor identities supplied by the caller.
    pub fn values(&self, author: &Identity, committer: &Identity) -> Vec<Value> {
        let mut values = vec![Value::Str(self.commit.sha.to_hex())];
        values.extend(actor_values(Some((&self.commit, author, committer))));
        values.extend([
            Value::Str(self.change.path.clone()),
            Value::from(self.change.insertions),
            Value::from(self.change.deletions),
            Value::from(self.change.lines),
            Value::Bool(self.change.is_binary),
        ]);
        values
    }
}

/// One hunk at one revision, joined with its commit when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRow {
    pub revision: String,
    pub hunk: LineAttributionRecord,
    /// `None` when the hunk's commit is not in the commit index.
    pub commit: Option<CommitRecord>,
}

impl AttributionRow {
    pub fn is_resolved(&self) -> bool {
        self.commit.is_some()
    }

    pub fn schema() -> Vec<Column> {
        let mut columns = vec![
            Column::new("revision", ColumnType::Str),
            Column::new("path", ColumnType::Str),
            Column::new("sha", ColumnType::Str),
            Column::new("old_start", ColumnType::Int),
            Column::new("new_start", ColumnType::Int),
            Column::new("line_count", ColumnType::Int),
        ];
        columns.extend(actor_columns());
        columns.push(Column::new("unresolved", ColumnType::Bool));
        columns
    }

    pub fn values(&self, actors: Option<(&Identity, &Identity)>) -> Vec<Value> {
        let mut values = vec![
            Value::Str(self.revision.clone()),
            Value::Str(self.hunk.path.clone()),
            Value::Str(self.hunk.sha.to_hex()),
            Value::from(self.hunk.old_start),
            Value::from(self.hunk.new_start),
            Value::from(self.hunk.line_count),
        ];
        let joined = match (&self.commit, actors) {
            (Some(commit), Some((author, committer))) => Some((commit, author, committer)),
            _ => None,
        };
        values.extend(actor_values(joined));
        values.push(Value::Bool(!self.is_resolved()));
        values
    }
}

fn actor_columns() -> [Column; 7] {
    [
        Column::new("author_name", ColumnType::Str),
        Column::new("author_email", ColumnType::Str),
        Column::new("committer_name", ColumnType::Str),
        Column::new("committer_email", ColumnType::Str),
        Column::new("authored_at", ColumnType::Time),
        Column::new("committed_at", ColumnType::Time),
        Column::new("offset_defaulted", ColumnType::Bool),
    ]
}

fn actor_values(joined: Option<(&CommitRecord, &Identity, &Identity)>) -> [Value; 7] {
    match joined {
        Some((commit, author, committer)) => [
            Value::Str(author.name.clone()),
            Value::Str(author.email.clone()),
            Value::Str(committer.name.clone()),
            Value::Str(committer.email.clone()),
            Value::Time(commit.authored.at),
            Value::Time(commit.committed.at),
            Value::Bool(commit.has_defaulted_offset()),
        ],
        None => [
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
        ],
    }
}
