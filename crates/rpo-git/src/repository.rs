//! Git repository wrapper.

use git2::{ObjectType, Repository, TreeWalkMode, TreeWalkResult};
use rpo_core::ObjectId;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    #[error("Failed to run `git {command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`git {command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Result type for git operations.
pub type Result<T> = std::result::Result<T, GitError>;

impl From<GitError> for rpo_core::Error {
    fn from(e: GitError) -> Self {
        rpo_core::Error::Source(e.to_string())
    }
}

/// A git repository on disk.
///
/// Only the location is held; each call opens its own handle so the value
/// can be shared between worker threads.
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
    root: PathBuf,
}

impl GitRepository {
    /// Open the git repository containing `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::discover(&path)?;
        let root = repo
            .workdir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| repo.path().to_path_buf());
        tracing::debug!("Opened repository at {}", root.display());
        Ok(Self { path, root })
    }

    /// Get the repository root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The path the repository was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.root)?)
    }

    /// The commit HEAD points at.
    pub fn head_commit_id(&self) -> Result<ObjectId> {
        let repo = self.repo()?;
        let commit = repo.head()?.peel_to_commit()?;
        to_object_id(commit.id())
    }

    /// Every blob tracked at `revision`, with its id.
    pub fn list_files(&self, revision: &str) -> Result<Vec<(ObjectId, String)>> {
        let repo = self.repo()?;
        let commit = repo
            .revparse_single(revision)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| GitError::InvalidRevision(revision.to_string()))?;
        let tree = commit.tree()?;

        let mut files = Vec::new();
        let mut failure = None;
        let walked = tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                let path = format!("{}{}", dir, entry.name().unwrap_or(""));
                match to_object_id(entry.id()) {
                    Ok(id) => files.push((id, path)),
                    Err(e) => {
                        failure = Some(e);
                        return TreeWalkResult::Abort;
                    }
                }
            }
            TreeWalkResult::Ok
        });

        match failure {
            Some(e) => Err(e),
            None => walked.map(|_| files).map_err(GitError::from),
        }
    }
}

fn to_object_id(oid: git2::Oid) -> Result<ObjectId> {
    let bytes: [u8; 20] = oid
        .as_bytes()
        .try_into()
        .map_err(|_| GitError::InvalidRevision(oid.to_string()))?;
    Ok(ObjectId::from_bytes(bytes))
}
