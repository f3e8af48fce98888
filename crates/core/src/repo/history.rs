//! Path history lookups for fallback attribution.
//!
//! When blame can say nothing about a side (the file is gone there, or the
//! conflicting region has no surviving lines), the classifier falls back to
//! the most recent non-merge commit that touched the path on that side.
//! This includes the commit that deleted the file, which blame can never
//! return.

use std::path::Path;

use git2::{DiffOptions, Oid, Repository, Sort};
use tracing::debug;

use crate::errors::RepoError;
use crate::repo::client::{commit_to_meta, CommitMeta};

/// Upper bound on how far back the walk goes before giving up.
const MAX_WALK: usize = 10_000;

/// Find the most recent non-merge commit on the first-parent chain of `tip`
/// whose tree changed for `path` (modification, addition, or deletion).
pub fn last_commit_touching(
    repo: &Repository,
    tip: Oid,
    path: &Path,
) -> Result<Option<CommitMeta>, RepoError> {
    let mut walk = repo.revwalk()?;
    walk.push(tip)?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    walk.simplify_first_parent()?;

    for (steps, oid) in walk.enumerate() {
        if steps >= MAX_WALK {
            break;
        }
        let oid = oid?;
        let commit = repo.find_commit(oid)?;

        // Merge commits are never acceptable attribution targets.
        if commit.parent_count() > 1 {
            continue;
        }

        let tree = commit.tree()?;
        let touched = match commit.parent_count() {
            0 => tree.get_path(path).is_ok(),
            _ => {
                let parent_tree = commit.parent(0)?.tree()?;
                let mut opts = DiffOptions::new();
                opts.pathspec(path);
                let diff =
                    repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), Some(&mut opts))?;
                diff.deltas().len() > 0
            }
        };

        if touched {
            debug!(path = %path.display(), commit = %oid, "found last commit touching path");
            return Ok(Some(commit_to_meta(&commit)));
        }
    }

    debug!(path = %path.display(), %tip, "no non-merge commit touching path");
    Ok(None)
}
