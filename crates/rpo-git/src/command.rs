//! Streams produced by the `git` executable.

use crate::repository::{GitError, GitRepository, Result};
use rpo_core::parser::LogFormat;
use rpo_core::LogQuery;
use std::ffi::OsStr;
use std::process::Command;

impl GitRepository {
    /// Run git in the repository root and capture stdout.
    fn run_git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let command = args
            .iter()
            .map(|a| a.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!("Running git {}", command);

        let output = Command::new("git")
            .arg("-C")
            .arg(self.root())
            .args(["-c", "core.quotepath=off"])
            .args(&args)
            .output()
            .map_err(|source| GitError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(GitError::Command {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Newest-first log with numstat lines for the commits `query` selects.
    pub fn log_numstat(&self, query: &LogQuery, format: &LogFormat) -> Result<String> {
        let mut args = vec![
            "log".to_string(),
            "--numstat".to_string(),
            "--no-renames".to_string(),
            format!("--format={}", format.git_pretty_format()),
        ];
        if query.no_merges {
            args.push("--no-merges".to_string());
        }
        args.push(match query.since {
            Some(since) => format!("{since}..HEAD"),
            None => "HEAD".to_string(),
        });
        self.run_git(args)
    }

    /// Incremental blame of `path` at `revision`.
    pub fn blame_incremental(&self, revision: &str, path: &str, ignore_whitespace: bool) -> Result<String> {
        let mut args = vec!["blame", "--incremental"];
        if ignore_whitespace {
            args.push("-w");
        }
        args.extend([revision, "--", path]);
        self.run_git(args)
    }
}
