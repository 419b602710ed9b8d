//! Picking revisions to sample history at.

use crate::error::{Error, Result};
use crate::record::CommitRecord;
use chrono::{Datelike, Utc};
use std::str::FromStr;

/// How densely to sample history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    /// Every n-th commit.
    EveryNth(usize),
}

impl FromStr for Cadence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "day" | "daily" => Ok(Cadence::Daily),
            "week" | "weekly" => Ok(Cadence::Weekly),
            "month" | "monthly" => Ok(Cadence::Monthly),
            _ => {
                let n = s
                    .strip_prefix("every:")
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        Error::Configuration(format!(
                            "cadence must be day, week, month or every:N with N > 0, got {s:?}"
                        ))
                    })?;
                Ok(Cadence::EveryNth(n))
            }
        }
    }
}

/// Revisions to attribute at, oldest first.
///
/// Calendar cadences keep the newest commit of each UTC day, ISO week or
/// month. `EveryNth` counts back from the newest commit, which is always
/// included.
pub fn sample_revisions(commits: &[CommitRecord], cadence: Cadence) -> Vec<String> {
    let mut ordered: Vec<&CommitRecord> = commits.iter().collect();
    ordered.sort_by_key(|c| c.committed.at);

    let picked: Vec<&CommitRecord> = match cadence {
        Cadence::EveryNth(n) => {
            let mut picked: Vec<&CommitRecord> = ordered.iter().rev().step_by(n.max(1)).copied().collect();
            picked.reverse();
            picked
        }
        calendar => {
            let bucket = |c: &CommitRecord| {
                let at = c.committed.at.with_timezone(&Utc);
                match calendar {
                    Cadence::Daily => (at.year(), at.ordinal()),
                    Cadence::Weekly => {
                        let week = at.iso_week();
                        (week.year(), week.week())
                    }
                    _ => (at.year(), at.month()),
                }
            };
            let mut picked: Vec<&CommitRecord> = Vec::new();
            for commit in ordered {
                match picked.last_mut() {
                    Some(last) if bucket(*last) == bucket(commit) => *last = commit,
                    _ => picked.push(commit),
                }
            }
            picked
        }
    };

    picked.into_iter().map(|c| c.sha.to_hex()).collect()
}
