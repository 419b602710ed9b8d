//! Commit-log stream parsing.
//!
//! The stream is newest-first. Each commit is one delimited header line
//! followed by zero or more `insertions\tdeletions\tpath` stat lines:
//!
//! ```text
//! <sha>␟<committer>␟<committer email>␟<committed>␟<author>␟<author email>␟<authored>␟<tree>
//!
//! 12\t3\tsrc/lib.rs
//! -\t-\tassets/logo.png
//! ```

use crate::error::{Error, Result, Warned, Warning};
use crate::object_id::ObjectId;
use crate::record::{Changeset, CommitRecord, FileChangeRecord, Identity, Timestamp};
use std::collections::VecDeque;
use std::iter::Enumerate;
use std::str::Lines;

/// Shape of a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFormat {
    delimiter: char,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self { delimiter: '\x1f' }
    }
}

impl LogFormat {
    /// Fields per header: sha, committer name/email/time, author name/email/time, tree.
    pub const FIELD_COUNT: usize = 8;

    const PLACEHOLDERS: [&'static str; Self::FIELD_COUNT] =
        ["%H", "%cN", "%cE", "%cI", "%aN", "%aE", "%aI", "%T"];

    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// The `git log --format` string producing headers of this shape.
    pub fn git_pretty_format(&self) -> String {
        let sep = if self.delimiter.is_ascii() {
            format!("%x{:02x}", self.delimiter as u32)
        } else {
            self.delimiter.to_string()
        };
        Self::PLACEHOLDERS.join(&sep)
    }

    /// The header fields of `line`, or `None` if it is not a header.
    pub fn split_header<'a>(&self, line: &'a str) -> Option<Vec<&'a str>> {
        let fields: Vec<&str> = line.split(self.delimiter).collect();
        (fields.len() == Self::FIELD_COUNT).then_some(fields)
    }
}

/// Order in which collected changesets are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamOrder {
    /// As the log tool emits them.
    #[default]
    NewestFirst,
    /// Reversed, the order ingestion persists them in.
    OldestFirst,
}

/// Parser for commit-log streams.
#[derive(Debug, Clone, Default)]
pub struct LogRecordParser {
    format: LogFormat,
}

impl LogRecordParser {
    pub fn new(format: LogFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &LogFormat {
        &self.format
    }

    /// Lazily parse `text` into changesets.
    ///
    /// Invalid records are yielded as non-fatal errors and parsing continues.
    /// A malformed line is yielded as [`Error::StreamFormat`] and ends the
    /// sequence; the commit it interrupted is discarded.
    pub fn parse<'a>(&self, text: &'a str) -> LogRecords<'a> {
        LogRecords {
            format: self.format,
            lines: text.lines().enumerate(),
            pending: Pending::None,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Parse the whole stream, turning dropped records into warnings.
    pub fn collect(&self, text: &str, order: StreamOrder) -> Result<Warned<Vec<Changeset>>> {
        let mut changesets = Vec::new();
        let mut warnings = Vec::new();

        for item in self.parse(text) {
            match item {
                Ok(changeset) => {
                    if changeset.commit.has_defaulted_offset() {
                        tracing::warn!(
                            "Commit {} has an unreadable UTC offset, assuming UTC",
                            changeset.commit.sha.short()
                        );
                        warnings.push(Warning::DefaultedOffset {
                            sha: changeset.commit.sha.to_hex(),
                        });
                    }
                    changesets.push(changeset);
                }
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("Dropping log record: {}", e);
                    warnings.push(Warning::RecordDropped(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        if order == StreamOrder::OldestFirst {
            changesets.reverse();
        }
        Ok(Warned::new(changesets, warnings))
    }
}

enum Pending {
    None,
    Valid(Changeset),
    /// The current header was invalid; its stat lines are skipped.
    Rejected,
}

/// Lazy sequence of changesets over a log stream.
pub struct LogRecords<'a> {
    format: LogFormat,
    lines: Enumerate<Lines<'a>>,
    pending: Pending,
    ready: VecDeque<Result<Changeset>>,
    finished: bool,
}

impl LogRecords<'_> {
    fn consume(&mut self, line_no: usize, raw: &str) {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() {
            return;
        }

        if let Some(fields) = self.format.split_header(line) {
            self.flush();
            match parse_header(&fields, line_no) {
                Ok(commit) => self.pending = Pending::Valid(Changeset::new(commit)),
                Err(e) => {
                    self.pending = Pending::Rejected;
                    self.ready.push_back(Err(e));
                }
            }
            return;
        }

        let stat: Vec<&str> = line.splitn(3, '\t').collect();
        if stat.len() != 3 {
            self.fail(line_no, line);
            return;
        }
        match &mut self.pending {
            Pending::None => self.fail(line_no, line),
            Pending::Rejected => {}
            Pending::Valid(changeset) => {
                match parse_stat(changeset.commit.sha, &stat, line_no) {
                    Ok(change) => changeset.changes.push(change),
                    Err(e) => self.ready.push_back(Err(e)),
                }
            }
        }
    }

    fn flush(&mut self) {
        if let Pending::Valid(changeset) = std::mem::replace(&mut self.pending, Pending::None) {
            self.ready.push_back(Ok(changeset));
        }
    }

    fn fail(&mut self, line_no: usize, line: &str) {
        self.pending = Pending::None;
        self.finished = true;
        self.ready.push_back(Err(Error::StreamFormat {
            line: line_no,
            content: line.to_string(),
        }));
    }
}

impl Iterator for LogRecords<'_> {
    type Item = Result<Changeset>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.lines.next() {
                Some((idx, raw)) => self.consume(idx + 1, raw),
                None => {
                    self.finished = true;
                    self.flush();
                }
            }
        }
    }
}

fn parse_header(fields: &[&str], line_no: usize) -> Result<CommitRecord> {
    let object_id = |raw: &str, what: &str| {
        ObjectId::from_hex(raw.trim()).map_err(|e| {
            Error::RecordValidation(format!("line {line_no}: invalid {what} {raw:?}: {e}"))
        })
    };
    let timestamp = |raw: &str| {
        Timestamp::parse(raw).ok_or_else(|| {
            Error::RecordValidation(format!("line {line_no}: unparseable timestamp {raw:?}"))
        })
    };

    Ok(CommitRecord {
        sha: object_id(fields[0], "sha")?,
        committer: Identity::new(fields[1], fields[2]),
        committed: timestamp(fields[3])?,
        author: Identity::new(fields[4], fields[5]),
        authored: timestamp(fields[6])?,
        tree: object_id(fields[7], "tree")?,
    })
}

fn parse_stat(sha: ObjectId, stat: &[&str], line_no: usize) -> Result<FileChangeRecord> {
    let path = stat[2];
    if path.is_empty() {
        return Err(Error::RecordValidation(format!(
            "line {line_no}: file change in {} has an empty path",
            sha.short()
        )));
    }
    let record = match (parse_count(stat[0], line_no)?, parse_count(stat[1], line_no)?) {
        (Some(insertions), Some(deletions)) => FileChangeRecord::new(sha, path, insertions, deletions),
        _ => FileChangeRecord::binary(sha, path),
    };
    record.validate()?;
    Ok(record)
}

/// A change count, or `None` for a non-numeric field such as the binary
/// marker `-`. Negative or overflowing numbers are invalid.
fn parse_count(raw: &str, line_no: usize) -> Result<Option<u64>> {
    let raw = raw.trim();
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    if raw.starts_with('-') {
        return Err(Error::RecordValidation(format!(
            "line {line_no}: negative change count {raw}"
        )));
    }
    raw.parse::<u64>().map(Some).map_err(|_| {
        Error::RecordValidation(format!("line {line_no}: change count {raw} is out of range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{header, sha};

    #[test]
    fn test_git_pretty_format() {
        assert_eq!(
            LogFormat::default().git_pretty_format(),
            "%H%x1f%cN%x1f%cE%x1f%cI%x1f%aN%x1f%aE%x1f%aI%x1f%T"
        );
        assert_eq!(
            LogFormat::with_delimiter('|').git_pretty_format(),
            "%H%x7c%cN%x7c%cE%x7c%cI%x7c%aN%x7c%aE%x7c%aI%x7c%T"
        );
    }

    #[test]
    fn test_parses_header_and_stats() {
        let text = format!(
            "{}\n\n12\t3\tsrc/lib.rs\n-\t-\tlogo.png\n",
            header('a', "Ada", "2025-06-22T10:23:45-04:00")
        );
        let parsed: Vec<Changeset> = LogRecordParser::default()
            .parse(&text)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(parsed.len(), 1);
        let cs = &parsed[0];
        assert_eq!(cs.commit.sha, sha('a'));
        assert_eq!(cs.commit.author.name, "Ada");
        assert_eq!(cs.changes.len(), 2);
        assert_eq!(cs.lines(), cs.insertions() + cs.deletions());
        assert!(!cs.changes[0].is_binary);
        assert!(cs.changes[1].is_binary);
        assert_eq!(cs.changes[1].lines, 0);
    }

    #[test]
    fn test_consecutive_headers_yield_empty_changeset() {
        let text = format!(
            "{}\n{}\n1\t1\tREADME.md\n",
            header('a', "Ada", "2025-06-22T10:23:45+00:00"),
            header('b', "Bob", "2025-06-21T10:23:45+00:00")
        );
        let parsed: Vec<Changeset> = LogRecordParser::default()
            .parse(&text)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].changes.is_empty());
        assert_eq!(parsed[1].changes.len(), 1);
    }

    #[test]
    fn test_negative_count_drops_record_only() {
        let text = format!(
            "{}\n-4\t1\tsrc/a.rs\n2\t0\tsrc/b.rs\n",
            header('a', "Ada", "2025-06-22T10:23:45+00:00")
        );
        let items: Vec<Result<Changeset>> = LogRecordParser::default().parse(&text).collect();

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Err(Error::RecordValidation(_))));
        let cs = items[1].as_ref().unwrap();
        assert_eq!(cs.changes.len(), 1);
        assert_eq!(cs.changes[0].path, "src/b.rs");
    }

    #[test]
    fn test_one_non_numeric_count_marks_binary() {
        let text = format!(
            "{}\n3\t-\tweird.bin\n",
            header('a', "Ada", "2025-06-22T10:23:45+00:00")
        );
        let parsed: Vec<Changeset> = LogRecordParser::default()
            .parse(&text)
            .collect::<Result<_>>()
            .unwrap();

        let change = &parsed[0].changes[0];
        assert!(change.is_binary);
        assert_eq!((change.insertions, change.deletions, change.lines), (0, 0, 0));
    }

    #[test]
    fn test_overflowing_count_drops_record_with_warning() {
        let text = format!(
            "{}\n99999999999999999999\t1\thuge.txt\n1\t1\tsmall.txt\n",
            header('a', "Ada", "2025-06-22T10:23:45+00:00")
        );
        let warned = LogRecordParser::default()
            .collect(&text, StreamOrder::NewestFirst)
            .unwrap();

        assert_eq!(warned.value.len(), 1);
        let paths: Vec<&str> = warned.value[0].changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["small.txt"]);
        assert!(matches!(
            warned.warnings.as_slice(),
            [Warning::RecordDropped(msg)] if msg.contains("out of range")
        ));
    }

    #[test]
    fn test_invalid_header_skips_its_stats() {
        let bad = header('a', "Ada", "2025-06-22T10:23:45+00:00").replacen(&"a".repeat(40), "zz", 1);
        let text = format!(
            "{bad}\n1\t1\tsrc/a.rs\n{}\n3\t0\tsrc/b.rs\n",
            header('b', "Bob", "2025-06-21T10:23:45+00:00")
        );
        let warned = LogRecordParser::default()
            .collect(&text, StreamOrder::NewestFirst)
            .unwrap();

        assert_eq!(warned.value.len(), 1);
        assert_eq!(warned.value[0].commit.sha, sha('b'));
        assert_eq!(warned.value[0].changes.len(), 1);
        assert!(matches!(warned.warnings[0], Warning::RecordDropped(_)));
    }

    #[test]
    fn test_malformed_line_ends_stream() {
        let text = format!(
            "{}\n1\t1\tsrc/a.rs\n{}\nthis is not a stat line\n2\t2\tsrc/c.rs\n",
            header('a', "Ada", "2025-06-22T10:23:45+00:00"),
            header('b', "Bob", "2025-06-21T10:23:45+00:00")
        );
        let items: Vec<Result<Changeset>> = LogRecordParser::default().parse(&text).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().commit.sha, sha('a'));
        match &items[1] {
            Err(Error::StreamFormat { line, content }) => {
                assert_eq!(*line, 4);
                assert_eq!(content, "this is not a stat line");
            }
            other => panic!("expected stream format error, got {other:?}"),
        }

        let err = LogRecordParser::default()
            .collect(&text, StreamOrder::NewestFirst)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stat_before_header_is_stream_error() {
        let items: Vec<Result<Changeset>> =
            LogRecordParser::default().parse("1\t2\tsrc/a.rs\n").collect();
        assert!(matches!(items.as_slice(), [Err(Error::StreamFormat { line: 1, .. })]));
    }

    #[test]
    fn test_defaulted_offset_is_flagged() {
        let text = format!("{}\n", header('a', "Ada", "2025-06-22T10:23:45+99:99"));
        let warned = LogRecordParser::default()
            .collect(&text, StreamOrder::NewestFirst)
            .unwrap();

        assert_eq!(warned.value.len(), 1);
        assert!(warned.value[0].commit.has_defaulted_offset());
        assert_eq!(
            warned.warnings,
            vec![Warning::DefaultedOffset { sha: sha('a').to_hex() }]
        );
    }

    #[test]
    fn test_oldest_first_order() {
        let text = format!(
            "{}\n{}\n",
            header('b', "Bob", "2025-06-22T10:23:45+00:00"),
            header('a', "Ada", "2025-06-21T10:23:45+00:00")
        );
        let warned = LogRecordParser::default()
            .collect(&text, StreamOrder::OldestFirst)
            .unwrap();
        let shas: Vec<ObjectId> = warned.value.iter().map(|cs| cs.commit.sha).collect();
        assert_eq!(shas, vec![sha('a'), sha('b')]);
    }

    #[test]
    fn test_crlf_and_tabs_in_path() {
        let text = format!(
            "{}\r\n\r\n5\t0\tdocs/odd\tname.md\r\n",
            header('a', "Ada", "2025-06-22T10:23:45+00:00")
        );
        let parsed: Vec<Changeset> = LogRecordParser::default()
            .parse(&text)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(parsed[0].changes[0].path, "docs/odd\tname.md");
    }
}
