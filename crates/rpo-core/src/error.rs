//! Error and warning types for rpo.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// rpo error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A log line matched neither the header shape nor the file-stat shape.
    #[error("Stream format error at line {line}: {content:?}")]
    StreamFormat { line: usize, content: String },

    /// A parsed record violates a data-model invariant
    #[error("Invalid record: {0}")]
    RecordValidation(String),

    /// The store rejected a batch
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Selection or grouping options are invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The external version-control tool failed
    #[error("Source error: {0}")]
    Source(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this error stops the current command.
    ///
    /// Validation failures only degrade the result set; everything else aborts.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::RecordValidation(_))
    }
}

/// A non-fatal condition reported alongside an otherwise successful result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("dropped record: {0}")]
    RecordDropped(String),

    #[error("dropped batch of {size} commit(s) bound for {destination}: {reason}")]
    BatchRejected {
        size: usize,
        destination: String,
        reason: String,
    },

    #[error("commit {sha} referenced by {path} is unknown; row kept without actor data")]
    UnresolvedCommit { sha: String, path: String },

    #[error("commit {sha} has an unparseable UTC offset; assumed UTC")]
    DefaultedOffset { sha: String },

    #[error("sort key {requested:?} is not a column; sorted by {fallback:?} instead")]
    InvalidSortKey { requested: String, fallback: String },

    #[error("aborted: {skipped} revision(s) were not attributed")]
    Aborted { skipped: usize },
}

/// A value paired with the warnings raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Warned<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Warned<T> {
    /// Wrap a value with no warnings.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Wrap a value with the given warnings.
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// Transform the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Warned<U> {
        Warned {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Move this value's warnings into `sink` and return the value.
    pub fn drain_into(self, sink: &mut Vec<Warning>) -> T {
        sink.extend(self.warnings);
        self.value
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(Error::StreamFormat { line: 3, content: "x".into() }.is_fatal());
        assert!(Error::Configuration("bad".into()).is_fatal());
        assert!(!Error::RecordValidation("negative".into()).is_fatal());
    }

    #[test]
    fn test_warned_drain() {
        let mut sink = Vec::new();
        let warned = Warned::new(3, vec![Warning::Aborted { skipped: 2 }]);
        let value = warned.map(|v| v * 2).drain_into(&mut sink);
        assert_eq!(value, 6);
        assert_eq!(sink, vec![Warning::Aborted { skipped: 2 }]);
    }
}
