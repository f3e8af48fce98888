//! Snapshot reader: file content at a specific commit.

use std::borrow::Cow;
use std::path::Path;

use git2::{Commit, ErrorCode, ObjectType, Repository};
use tracing::debug;

use crate::errors::RepoError;

/// Full content of one file at one commit.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    bytes: Vec<u8>,
    binary: bool,
}

impl FileSnapshot {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether libgit2 considers the blob binary.
    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// Lossy UTF-8 view of the content.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Read the content of `path` in `commit`'s tree.
///
/// Returns `Ok(None)` when the path does not exist there -- absence is a
/// normal answer (e.g. the file was deleted on one side), not an error.
pub fn read_snapshot(
    repo: &Repository,
    commit: &Commit,
    path: &Path,
) -> Result<Option<FileSnapshot>, RepoError> {
    let tree = commit.tree()?;
    let entry = match tree.get_path(path) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => {
            debug!(path = %path.display(), commit = %commit.id(), "path absent at commit");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    // Submodules and trees have no line content to attribute.
    if entry.kind() != Some(ObjectType::Blob) {
        return Ok(None);
    }

    let blob = repo.find_blob(entry.id())?;
    Ok(Some(FileSnapshot {
        binary: blob.is_binary(),
        bytes: blob.content().to_vec(),
    }))
}
