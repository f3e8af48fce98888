//! Local repository operations via `git2`.
//!
//! Everything here is a pure read: revparse, merge-base, commit metadata.
//! [`RepoClient::open_isolated`] hands out an independent `Repository`
//! handle per worker so concurrent path pipelines never share libgit2
//! state.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{Commit, Oid, Repository};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::RepoError;

/// High-level repository client wrapping a `git2::Repository`.
pub struct RepoClient {
    repo: Repository,
    repo_path: PathBuf,
}

/// Metadata for a single commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitMeta {
    pub id: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub is_merge: bool,
}

impl RepoClient {
    /// Open the repository containing `path` (discovers upward like git).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepoError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::discover(path)
            .map_err(|_| RepoError::RepositoryNotFound(path.display().to_string()))?;
        let repo_path = repo.path().to_path_buf();
        Ok(Self { repo, repo_path })
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Resolve a reference (branch name, tag, SHA, `HEAD`) to a commit id.
    pub fn resolve(&self, refname: &str) -> Result<Oid, RepoError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|_| RepoError::RefNotFound(refname.to_string()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| RepoError::RefNotFound(refname.to_string()))?;
        debug!(refname, oid = %commit.id(), "resolved reference");
        Ok(commit.id())
    }

    /// Shorthand name of the currently checked-out branch.
    pub fn current_branch(&self) -> Result<String, RepoError> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    /// Nearest common ancestor of two commits.
    pub fn merge_base(&self, one: Oid, two: Oid) -> Result<Oid, RepoError> {
        let base = self.repo.merge_base(one, two)?;
        debug!(%one, %two, %base, "computed merge base");
        Ok(base)
    }

    /// Reject an analysis where both sides are the same commit.
    pub fn ensure_distinct(&self, source: Oid, target: Oid) -> Result<(), RepoError> {
        if source == target {
            return Err(RepoError::SameCommit(source.to_string()));
        }
        Ok(())
    }

    /// Look up display metadata for a commit.
    pub fn commit_meta(&self, oid: Oid) -> Result<CommitMeta, RepoError> {
        let commit = self.repo.find_commit(oid)?;
        Ok(commit_to_meta(&commit))
    }
}

/// Convert a `git2::Commit` into [`CommitMeta`].
pub fn commit_to_meta(commit: &Commit) -> CommitMeta {
    let author = commit.author();
    CommitMeta {
        id: commit.id().to_string(),
        author: author.name().unwrap_or("Unknown").to_string(),
        email: author.email().unwrap_or("").to_string(),
        timestamp: timestamp_utc(author.when().seconds()),
        summary: commit.summary().unwrap_or("").to_string(),
        is_merge: commit.parent_count() > 1,
    }
}

/// Convert an epoch-seconds author time into `DateTime<Utc>`.
pub fn timestamp_utc(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH)
}
