//! Snapshot file listings: one `<blob id> <path>` line per tracked file.

use crate::error::{Error, Result};
use crate::object_id::ObjectId;

/// A tracked file at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub blob: ObjectId,
    pub path: String,
}

/// Parse a file listing. Blank lines are skipped; anything else that is not
/// an id followed by a path is a stream format error.
pub fn parse_file_listing(text: &str) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() {
            continue;
        }
        let malformed = || Error::StreamFormat {
            line: idx + 1,
            content: line.to_string(),
        };
        let (id, path) = line
            .split_once([' ', '\t'])
            .ok_or_else(malformed)?;
        let blob = ObjectId::from_hex(id).map_err(|_| malformed())?;
        if path.is_empty() {
            return Err(malformed());
        }
        entries.push(FileEntry {
            blob,
            path: path.to_string(),
        });
    }
    Ok(entries)
}
