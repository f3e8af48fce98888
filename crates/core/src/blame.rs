//! Blame resolution: per-line commit attribution at a reference.
//!
//! One blame pass per (reference, path) covers the union of every requested
//! range; entries outside the requested ranges are filtered afterwards.
//! Running blame line-by-line would fork the attribution work once per
//! line, which is exactly the cost this batching avoids.
//!
//! A merge commit is never an acceptable attribution target: when a hunk
//! blames a merge, the resolver re-blames the line with the newest commit
//! pinned to the merge's first parent and iterates until a non-merge commit
//! owns the line (explicit loop with a visited set, never recursion).

use std::collections::HashSet;
use std::path::Path;

use git2::{BlameOptions, ErrorCode, Oid, Repository};
use tracing::{debug, trace, warn};

use crate::errors::BlameError;
use crate::models::{BlameEntry, LineRange};
use crate::repo::client::{commit_to_meta, CommitMeta};

/// Upper bound on merge-resolution hops for one line.
const MAX_RESOLVE_HOPS: usize = 256;

/// Blame `path` at `tip`, returning one entry per requested line.
///
/// A path that does not exist at `tip` yields `Ok(vec![])`: "no attribution
/// available on this side" is an answer the classifier knows how to handle,
/// not an error.
pub fn blame_ranges(
    repo: &Repository,
    tip: Oid,
    path: &Path,
    ranges: &[LineRange],
) -> Result<Vec<BlameEntry>, BlameError> {
    if ranges.is_empty() {
        return Ok(Vec::new());
    }

    let lo = ranges.iter().map(|r| r.start).min().unwrap_or(1) as usize;
    let hi = ranges.iter().map(|r| r.end).max().unwrap_or(1) as usize;

    let mut opts = BlameOptions::new();
    opts.newest_commit(tip);
    opts.min_line(lo);
    opts.max_line(hi);

    let blame = match repo.blame_file(path, Some(&mut opts)) {
        Ok(blame) => blame,
        Err(e) if e.code() == ErrorCode::NotFound => {
            debug!(path = %path.display(), %tip, "path absent at reference, no blame");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for hunk in blame.iter() {
        let final_start = hunk.final_start_line() as u32;
        let orig_start = hunk.orig_start_line() as u32;
        for offset in 0..hunk.lines_in_hunk() as u32 {
            let line = final_start + offset;
            if !ranges.iter().any(|r| r.contains(line)) {
                continue;
            }
            let meta = resolve_to_nonmerge(
                repo,
                hunk.final_commit_id(),
                path,
                (orig_start + offset) as usize,
            )?;
            trace!(line, commit = %meta.id, "blamed line");
            entries.push(BlameEntry {
                line,
                commit_id: meta.id,
                is_merge: false,
                author: meta.author,
                email: meta.email,
                timestamp: meta.timestamp,
                summary: meta.summary,
            });
        }
    }

    debug!(
        path = %path.display(),
        %tip,
        lines = entries.len(),
        "blame pass complete"
    );
    Ok(entries)
}

/// Resolve an attributed commit through merge commits to the first-parent
/// ancestor that introduced the line.
///
/// Each hop re-blames the single line with the newest commit pinned to the
/// current merge's first parent. When the re-blame cannot proceed (the path
/// or line is gone at the parent), the walk falls back to the nearest
/// non-merge first-parent ancestor.
fn resolve_to_nonmerge(
    repo: &Repository,
    start: Oid,
    path: &Path,
    start_line: usize,
) -> Result<CommitMeta, BlameError> {
    let mut visited: HashSet<Oid> = HashSet::new();
    let mut current = start;
    let mut line = start_line;

    loop {
        if !visited.insert(current) || visited.len() > MAX_RESOLVE_HOPS {
            warn!(commit = %start, "cycle or depth limit while resolving merge attribution");
            return nearest_nonmerge_ancestor(repo, current);
        }

        let commit = repo.find_commit(current)?;
        if commit.parent_count() <= 1 {
            return Ok(commit_to_meta(&commit));
        }

        // Only hop when the first parent carries the same text at this
        // line; otherwise the merge itself introduced the content.
        let parent = commit.parent_id(0)?;
        if !same_line_text(repo, current, parent, path, line) {
            return nearest_nonmerge_ancestor(repo, current);
        }

        let mut opts = BlameOptions::new();
        opts.newest_commit(parent);
        opts.min_line(line);
        opts.max_line(line);

        let reblamed = match repo.blame_file(path, Some(&mut opts)) {
            Ok(blame) => blame.get_line(line).map(|hunk| {
                let offset = line - hunk.final_start_line();
                (hunk.final_commit_id(), hunk.orig_start_line() + offset)
            }),
            Err(_) => None,
        };

        match reblamed {
            Some((next, next_line)) => {
                trace!(merge = %current, %next, "resolved one merge hop");
                current = next;
                line = next_line;
            }
            // The merge itself introduced the content; attribute the
            // nearest real commit on its first-parent chain.
            None => return nearest_nonmerge_ancestor(repo, current),
        }
    }
}

/// Whether `path` has identical text at line `line` in both commits.
fn same_line_text(repo: &Repository, a: Oid, b: Oid, path: &Path, line: usize) -> bool {
    let line_at = |oid: Oid| -> Option<String> {
        let commit = repo.find_commit(oid).ok()?;
        let snapshot = crate::repo::read_snapshot(repo, &commit, path).ok()??;
        snapshot
            .text()
            .lines()
            .nth(line.checked_sub(1)?)
            .map(|l| l.to_string())
    };
    match (line_at(a), line_at(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Walk first parents until a non-merge commit appears.
fn nearest_nonmerge_ancestor(repo: &Repository, from: Oid) -> Result<CommitMeta, BlameError> {
    let mut visited: HashSet<Oid> = HashSet::new();
    let mut current = from;

    loop {
        if !visited.insert(current) || visited.len() > MAX_RESOLVE_HOPS {
            return Err(BlameError::MergeResolution(from.to_string()));
        }
        let commit = repo.find_commit(current)?;
        if commit.parent_count() <= 1 {
            return Ok(commit_to_meta(&commit));
        }
        current = commit.parent_id(0)?;
    }
}
