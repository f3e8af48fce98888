//! Divergence classification.
//!
//! Correlates the blame output for the same conflicting regions on source
//! vs. target and produces the commits that actually caused the divergence.
//! Pure functions over in-memory inputs: no repository access, so every
//! rule is unit-testable against fixture blame entries.
//!
//! Rules per region:
//! 1. Collect the set of distinct commit ids attributing the region's lines
//!    on each side. A side with no blameable lines substitutes its
//!    precomputed fallback commit (e.g. the commit that deleted the file).
//! 2. Identical non-empty sets on both sides mean the region is stale (the
//!    same change reached both branches) and contributes nothing.
//! 3. Otherwise the symmetric difference is divergence-causing; commits in
//!    the intersection are common history and are discarded, as are the
//!    merge base and anything carrying the tool's own artifact marker.
//! 4. A region with nothing on either side is surfaced as unattributed,
//!    never silently dropped.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::merge::regions::ConflictRegion;
use crate::models::{commit_ordering, AttributedCommit, BlameEntry, LineRange, Side};
use crate::repo::client::CommitMeta;

/// Marker embedded in commit subjects by this tool's own disposable merge
/// artifacts; such commits are never valid attribution targets.
pub const ARTIFACT_MARKER: &str = "[git-mediate]";

/// Fallback attribution per side, precomputed by the engine for sides where
/// blame can say nothing (deleted file, vanished lines).
#[derive(Debug, Clone, Default)]
pub struct SideFallbacks {
    pub source: Option<CommitMeta>,
    pub target: Option<CommitMeta>,
}

/// Classification outcome for one path.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Divergence-causing commits, deduplicated within the path.
    pub commits: Vec<AttributedCommit>,
    /// Regions no commit could be found for on either side.
    pub unattributed: Vec<LineRange>,
}

/// Classify one path's regions into attributed commits.
pub fn classify(
    path: &str,
    regions: &[ConflictRegion],
    source_blame: &[BlameEntry],
    target_blame: &[BlameEntry],
    fallbacks: &SideFallbacks,
    merge_base: Option<&str>,
) -> Classification {
    let mut outcome = Classification::default();
    let mut seen: BTreeMap<String, AttributedCommit> = BTreeMap::new();
    let metadata = metadata_index(source_blame, target_blame, fallbacks);

    for region in regions {
        let src_ids = side_ids(region.source, source_blame, fallbacks.source.as_ref(), merge_base);
        let tgt_ids = side_ids(region.target, target_blame, fallbacks.target.as_ref(), merge_base);

        if src_ids.is_empty() && tgt_ids.is_empty() {
            debug!(path, range = %region.reported, "region unattributed on both sides");
            outcome.unattributed.push(region.reported);
            continue;
        }

        // Identical sets on both sides: the same change reached both
        // branches (cherry-pick landed twice, or the extractor's two-way
        // fallback over-reported). Not a divergence source.
        if src_ids == tgt_ids {
            debug!(path, range = %region.reported, "region stale, identical attribution sets");
            continue;
        }

        for (ids, side) in [(&src_ids, Side::Source), (&tgt_ids, Side::Target)] {
            let other = match side {
                Side::Source => &tgt_ids,
                Side::Target => &src_ids,
            };
            for id in ids.iter().filter(|id| !other.contains(*id)) {
                let Some(meta) = metadata.get(id.as_str()) else {
                    continue;
                };
                seen.entry(id.clone())
                    .and_modify(|c| {
                        c.sides.insert(side);
                    })
                    .or_insert_with(|| AttributedCommit {
                        commit_id: meta.id.to_string(),
                        author: meta.author.to_string(),
                        email: meta.email.to_string(),
                        timestamp: meta.timestamp,
                        summary: meta.summary.to_string(),
                        sides: BTreeSet::from([side]),
                    });
            }
        }
    }

    outcome.commits = seen.into_values().collect();
    outcome
}

/// The distinct commit ids attributing a side's lines for one region.
///
/// Blame entries are trusted only when non-merge and free of the artifact
/// marker; an empty outcome substitutes the side's fallback commit.
fn side_ids(
    range: Option<LineRange>,
    blame: &[BlameEntry],
    fallback: Option<&CommitMeta>,
    merge_base: Option<&str>,
) -> BTreeSet<String> {
    let mut ids: BTreeSet<String> = BTreeSet::new();

    if let Some(range) = range {
        for entry in blame.iter().filter(|e| range.contains(e.line)) {
            if entry.is_merge || entry.summary.contains(ARTIFACT_MARKER) {
                continue;
            }
            if merge_base == Some(entry.commit_id.as_str()) {
                continue;
            }
            ids.insert(entry.commit_id.clone());
        }
    }

    if ids.is_empty() {
        if let Some(meta) = fallback {
            if !meta.is_merge
                && !meta.summary.contains(ARTIFACT_MARKER)
                && merge_base != Some(meta.id.as_str())
            {
                ids.insert(meta.id.clone());
            }
        }
    }

    ids
}

/// Index every commit id we might attribute to its display metadata.
fn metadata_index<'a>(
    source_blame: &'a [BlameEntry],
    target_blame: &'a [BlameEntry],
    fallbacks: &'a SideFallbacks,
) -> BTreeMap<&'a str, MetaRef<'a>> {
    let mut index: BTreeMap<&str, MetaRef<'_>> = BTreeMap::new();
    for entry in source_blame.iter().chain(target_blame) {
        index.insert(
            entry.commit_id.as_str(),
            MetaRef {
                id: &entry.commit_id,
                author: &entry.author,
                email: &entry.email,
                timestamp: entry.timestamp,
                summary: &entry.summary,
            },
        );
    }
    for meta in [fallbacks.source.as_ref(), fallbacks.target.as_ref()]
        .into_iter()
        .flatten()
    {
        index.insert(
            meta.id.as_str(),
            MetaRef {
                id: &meta.id,
                author: &meta.author,
                email: &meta.email,
                timestamp: meta.timestamp,
                summary: &meta.summary,
            },
        );
    }
    index
}

#[derive(Debug, Clone, Copy)]
struct MetaRef<'a> {
    id: &'a str,
    author: &'a str,
    email: &'a str,
    timestamp: chrono::DateTime<chrono::Utc>,
    summary: &'a str,
}

/// Merge per-path classifications into the final deduplicated, ordered
/// commit list. This is the single aggregation point of the whole run.
pub fn aggregate(per_path: Vec<Classification>) -> Vec<AttributedCommit> {
    let mut merged: BTreeMap<String, AttributedCommit> = BTreeMap::new();
    for classification in per_path {
        for commit in classification.commits {
            merged
                .entry(commit.commit_id.clone())
                .and_modify(|c| c.absorb(&commit))
                .or_insert(commit);
        }
    }
    let mut commits: Vec<AttributedCommit> = merged.into_values().collect();
    commits.sort_by(commit_ordering);
    commits
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(line: u32, id: &str, secs: i64) -> BlameEntry {
        BlameEntry {
            line,
            commit_id: id.to_string(),
            is_merge: false,
            author: format!("author-{id}"),
            email: format!("{id}@example.com"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            summary: format!("commit {id}"),
        }
    }

    fn meta(id: &str, secs: i64) -> CommitMeta {
        CommitMeta {
            id: id.to_string(),
            author: format!("author-{id}"),
            email: format!("{id}@example.com"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            summary: format!("commit {id}"),
            is_merge: false,
        }
    }

    fn region(start: u32, end: u32) -> ConflictRegion {
        ConflictRegion {
            reported: LineRange::new(start, end),
            source: Some(LineRange::new(start, end)),
            target: Some(LineRange::new(start, end)),
        }
    }

    #[test]
    fn test_one_commit_per_side() {
        let regions = vec![region(5, 5)];
        let classification = classify(
            "f.txt",
            &regions,
            &[entry(5, "c1", 100)],
            &[entry(5, "c2", 200)],
            &SideFallbacks::default(),
            None,
        );
        assert_eq!(classification.commits.len(), 2);
        assert!(classification.unattributed.is_empty());

        let c1 = classification
            .commits
            .iter()
            .find(|c| c.commit_id == "c1")
            .unwrap();
        assert_eq!(c1.sides, BTreeSet::from([Side::Source]));
        let c2 = classification
            .commits
            .iter()
            .find(|c| c.commit_id == "c2")
            .unwrap();
        assert_eq!(c2.sides, BTreeSet::from([Side::Target]));
    }

    #[test]
    fn test_stale_region_contributes_nothing() {
        // Both sides attribute the range to the exact same commit.
        let regions = vec![region(3, 4)];
        let classification = classify(
            "f.txt",
            &regions,
            &[entry(3, "shared", 100), entry(4, "shared", 100)],
            &[entry(3, "shared", 100), entry(4, "shared", 100)],
            &SideFallbacks::default(),
            None,
        );
        assert!(classification.commits.is_empty());
        assert!(classification.unattributed.is_empty());
    }

    #[test]
    fn test_intersection_commits_discarded() {
        // "shared" appears on both sides, "only-src" on one: only the
        // latter caused divergence.
        let regions = vec![region(1, 2)];
        let classification = classify(
            "f.txt",
            &regions,
            &[entry(1, "shared", 100), entry(2, "only-src", 150)],
            &[entry(1, "shared", 100), entry(2, "shared", 100)],
            &SideFallbacks::default(),
            None,
        );
        let ids: Vec<&str> = classification
            .commits
            .iter()
            .map(|c| c.commit_id.as_str())
            .collect();
        assert_eq!(ids, vec!["only-src"]);
    }

    #[test]
    fn test_fallback_substitution_for_deleted_side() {
        // Target deleted the file: its region range is None and blame is
        // empty; the deletion commit comes in via fallback.
        let regions = vec![ConflictRegion {
            reported: LineRange::new(1, 3),
            source: Some(LineRange::new(1, 3)),
            target: None,
        }];
        let fallbacks = SideFallbacks {
            source: None,
            target: Some(meta("deleter", 300)),
        };
        let classification = classify(
            "g.txt",
            &regions,
            &[entry(2, "modifier", 250)],
            &[],
            &fallbacks,
            None,
        );
        assert_eq!(classification.commits.len(), 2);
        let deleter = classification
            .commits
            .iter()
            .find(|c| c.commit_id == "deleter")
            .unwrap();
        assert_eq!(deleter.sides, BTreeSet::from([Side::Target]));
    }

    #[test]
    fn test_unattributed_region_surfaced() {
        let regions = vec![region(7, 9)];
        let classification = classify(
            "f.txt",
            &regions,
            &[],
            &[],
            &SideFallbacks::default(),
            None,
        );
        assert!(classification.commits.is_empty());
        assert_eq!(classification.unattributed, vec![LineRange::new(7, 9)]);
    }

    #[test]
    fn test_merge_entries_and_artifacts_excluded() {
        let mut merge_entry = entry(5, "m1", 400);
        merge_entry.is_merge = true;
        let mut artifact = entry(5, "a1", 500);
        artifact.summary = format!("{ARTIFACT_MARKER} transient merge");

        let regions = vec![region(5, 5)];
        let classification = classify(
            "f.txt",
            &regions,
            &[merge_entry, artifact],
            &[entry(5, "real", 600)],
            &SideFallbacks::default(),
            None,
        );
        let ids: Vec<&str> = classification
            .commits
            .iter()
            .map(|c| c.commit_id.as_str())
            .collect();
        assert_eq!(ids, vec!["real"]);
    }

    #[test]
    fn test_merge_base_never_attributed() {
        let regions = vec![region(5, 5)];
        let classification = classify(
            "f.txt",
            &regions,
            &[entry(5, "base", 50)],
            &[entry(5, "c2", 200)],
            &SideFallbacks::default(),
            Some("base"),
        );
        let ids: Vec<&str> = classification
            .commits
            .iter()
            .map(|c| c.commit_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c2"]);
    }

    #[test]
    fn test_commit_spanning_regions_deduplicated() {
        let regions = vec![region(1, 1), region(9, 9)];
        let classification = classify(
            "f.txt",
            &regions,
            &[entry(1, "c1", 100), entry(9, "c1", 100)],
            &[entry(1, "c2", 200), entry(9, "c3", 300)],
            &SideFallbacks::default(),
            None,
        );
        let c1_count = classification
            .commits
            .iter()
            .filter(|c| c.commit_id == "c1")
            .count();
        assert_eq!(c1_count, 1);
    }

    #[test]
    fn test_aggregate_dedups_across_paths_and_sorts() {
        let a = Classification {
            commits: vec![AttributedCommit {
                commit_id: "cc".into(),
                author: "a".into(),
                email: "a@example.com".into(),
                timestamp: Utc.timestamp_opt(100, 0).unwrap(),
                summary: "s".into(),
                sides: BTreeSet::from([Side::Source]),
            }],
            unattributed: vec![],
        };
        let b = Classification {
            commits: vec![
                AttributedCommit {
                    commit_id: "cc".into(),
                    author: "a".into(),
                    email: "a@example.com".into(),
                    timestamp: Utc.timestamp_opt(100, 0).unwrap(),
                    summary: "s".into(),
                    sides: BTreeSet::from([Side::Target]),
                },
                AttributedCommit {
                    commit_id: "dd".into(),
                    author: "d".into(),
                    email: "d@example.com".into(),
                    timestamp: Utc.timestamp_opt(999, 0).unwrap(),
                    summary: "newest".into(),
                    sides: BTreeSet::from([Side::Source]),
                },
            ],
            unattributed: vec![],
        };

        let commits = aggregate(vec![a, b]);
        assert_eq!(commits.len(), 2);
        // Newest first.
        assert_eq!(commits[0].commit_id, "dd");
        // Sides merged on collision.
        assert_eq!(
            commits[1].sides,
            BTreeSet::from([Side::Source, Side::Target])
        );
    }
}
