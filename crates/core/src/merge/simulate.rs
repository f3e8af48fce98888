//! In-memory merge simulation.
//!
//! Computes the result of merging `source` into `target` without touching
//! the index, the working tree, or the object store: `git2`'s
//! `merge_commits` produces a transient in-memory index, which is inspected
//! for conflicts and then dropped. For textual modify/modify conflicts a
//! marked merge preview is rendered with `diffy` so the region extractor
//! can read conflict boundaries straight from the markers.

use std::collections::BTreeMap;

use diffy::{ConflictStyle, MergeOptions as DiffyMergeOptions};
use git2::{IndexEntry, MergeOptions, Oid, Repository};
use tracing::{debug, info};

use crate::errors::SimulateError;
use crate::models::ConflictKind;

/// One path the simulated merge could not auto-resolve.
#[derive(Debug, Clone)]
pub struct SimulatedConflict {
    /// Canonical repository-relative path (the surviving side's path for
    /// delete/modify, "our" side's path for renames).
    pub path: String,
    pub kind: ConflictKind,
    /// Merged content with standard conflict markers, for textual
    /// modify/modify conflicts where all three versions were readable.
    pub merged_preview: Option<String>,
}

/// Outcome of one merge simulation. Holds no repository state; everything
/// transient the merge computation created is gone once this is built.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    /// Conflicted paths in ascending path order.
    pub conflicts: Vec<SimulatedConflict>,
}

/// Simulate merging `source` and `target`, returning the conflicted paths.
pub fn simulate(
    repo: &Repository,
    source: Oid,
    target: Oid,
) -> Result<Simulation, SimulateError> {
    let source_commit = repo.find_commit(source)?;
    let target_commit = repo.find_commit(target)?;

    let mut opts = MergeOptions::new();
    opts.fail_on_conflict(false);

    // "our" = source (the branch being merged), "their" = target.
    let index = repo
        .merge_commits(&source_commit, &target_commit, Some(&opts))
        .map_err(|e| SimulateError::MergeComputation {
            source: source.to_string(),
            target: target.to_string(),
            detail: e.message().to_string(),
        })?;

    if !index.has_conflicts() {
        info!(%source, %target, "simulated merge is clean");
        return Ok(Simulation::default());
    }

    // One logical conflict per canonical path; the index iterator can emit
    // several stage groups for rename conflicts.
    let mut by_path: BTreeMap<String, SimulatedConflict> = BTreeMap::new();

    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let ancestor = conflict.ancestor.as_ref();
        let our = conflict.our.as_ref();
        let their = conflict.their.as_ref();

        // Both sides deleted: nothing left to disagree about.
        let path = match (our, their) {
            (Some(entry), _) | (_, Some(entry)) => entry_path(entry),
            (None, None) => continue,
        };

        let kind = classify_entry(repo, ancestor, our, their);
        let merged_preview = if kind == ConflictKind::ModifiedModified {
            render_preview(repo, ancestor, our, their)
        } else {
            None
        };

        debug!(path = %path, kind = %kind, "conflict in simulated merge");
        by_path
            .entry(path.clone())
            .or_insert(SimulatedConflict {
                path,
                kind,
                merged_preview,
            });
    }

    let conflicts: Vec<SimulatedConflict> = by_path.into_values().collect();
    info!(count = conflicts.len(), "simulated merge has conflicts");
    Ok(Simulation { conflicts })
}

/// Classify what kind of conflict an index stage group represents.
fn classify_entry(
    repo: &Repository,
    ancestor: Option<&IndexEntry>,
    our: Option<&IndexEntry>,
    their: Option<&IndexEntry>,
) -> ConflictKind {
    if is_binary(repo, our) || is_binary(repo, their) || is_binary(repo, ancestor) {
        return ConflictKind::Binary;
    }

    match (our, their) {
        (Some(o), Some(t)) => {
            if entry_path(o) != entry_path(t) {
                ConflictKind::RenameConflict
            } else {
                ConflictKind::ModifiedModified
            }
        }
        (Some(_), None) | (None, Some(_)) => ConflictKind::DeleteModify,
        (None, None) => ConflictKind::ModifiedModified,
    }
}

/// Render a merged preview with standard `<<<<<<<`/`>>>>>>>` markers.
///
/// Requires all three blobs present and textual; otherwise there is no
/// marker preview and the extractor falls back to its two-way diffs.
fn render_preview(
    repo: &Repository,
    ancestor: Option<&IndexEntry>,
    our: Option<&IndexEntry>,
    their: Option<&IndexEntry>,
) -> Option<String> {
    let base = blob_text(repo, ancestor)?;
    let ours = blob_text(repo, our)?;
    let theirs = blob_text(repo, their)?;

    match DiffyMergeOptions::new()
        .set_conflict_style(ConflictStyle::Merge)
        .merge(&base, &ours, &theirs)
    {
        // A path the index flagged can still merge textually clean (e.g.
        // mode-only disagreement); no markers means nothing to parse.
        Ok(_) => None,
        Err(conflicted) => Some(conflicted),
    }
}

fn entry_path(entry: &IndexEntry) -> String {
    String::from_utf8_lossy(&entry.path).into_owned()
}

fn is_binary(repo: &Repository, entry: Option<&IndexEntry>) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    repo.find_blob(entry.id)
        .map(|blob| blob.is_binary())
        .unwrap_or(false)
}

fn blob_text(repo: &Repository, entry: Option<&IndexEntry>) -> Option<String> {
    let entry = entry?;
    let blob = repo.find_blob(entry.id).ok()?;
    if blob.is_binary() {
        return None;
    }
    Some(String::from_utf8_lossy(blob.content()).into_owned())
}
