//! Incremental blame parsing.
//!
//! Each block of an incremental blame opens with
//! `<sha> <old start> <new start> <line count>`; commit metadata lines follow
//! only the first time a commit appears. Only block headers carry
//! attribution, so they are matched directly and everything else is ignored.

use crate::object_id::ObjectId;
use crate::record::LineAttributionRecord;
use regex::{CaptureMatches, Regex};
use std::sync::LazyLock;

static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([0-9a-f]{40})[ \t]+(\d+)[ \t]+(\d+)[ \t]+(\d+)\r?$").unwrap()
});

/// Parser for the incremental blame of a single file.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlameTraceParser;

impl BlameTraceParser {
    /// Lazily extract hunks from `text`, attributing them to `path`.
    pub fn parse<'r, 't>(&self, text: &'t str, path: &'r str) -> BlameHunks<'r, 't> {
        BlameHunks {
            captures: HUNK_RE.captures_iter(text),
            path,
        }
    }
}

/// Hunks of one file, in trace order.
pub struct BlameHunks<'r, 't> {
    captures: CaptureMatches<'static, 't>,
    path: &'r str,
}

impl Iterator for BlameHunks<'_, '_> {
    type Item = LineAttributionRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for caps in self.captures.by_ref() {
            let parsed = (
                ObjectId::from_hex(&caps[1]),
                caps[2].parse::<u64>(),
                caps[3].parse::<u64>(),
                caps[4].parse::<u64>(),
            );
            match parsed {
                (Ok(sha), Ok(old_start), Ok(new_start), Ok(line_count)) => {
                    return Some(LineAttributionRecord {
                        sha,
                        path: self.path.to_string(),
                        old_start,
                        new_start,
                        line_count,
                    });
                }
                _ => tracing::warn!(
                    "Skipping unreadable blame hunk in {}: {:?}",
                    self.path,
                    &caps[0]
                ),
            }
        }
        None
    }
}
