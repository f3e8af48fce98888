//! Domain model types for merge-conflict attribution.
//!
//! These types bridge the merge simulator, blame resolver, classifier, and
//! the report rendering in the CLI.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Conflicted paths
// ---------------------------------------------------------------------------

/// Categorisation of a conflicted path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides modified the same text content.
    ModifiedModified,
    /// One side edited, the other deleted.
    DeleteModify,
    /// Both sides renamed the same file differently.
    RenameConflict,
    /// Binary file changed on both sides; no line-level analysis possible.
    Binary,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModifiedModified => write!(f, "modified/modified"),
            Self::DeleteModify => write!(f, "delete/modify"),
            Self::RenameConflict => write!(f, "rename"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// A path the simulated merge could not auto-resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictedPath {
    /// Repository-relative file path.
    pub path: String,
    /// What kind of conflict this is.
    pub kind: ConflictKind,
    /// Reportable conflict regions, ascending and non-overlapping.
    /// Empty for binary conflicts.
    pub ranges: Vec<LineRange>,
}

// ---------------------------------------------------------------------------
// Line ranges
// ---------------------------------------------------------------------------

/// An inclusive, 1-based, non-empty range of lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// Build a range, clamping so `start <= end` always holds.
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Number of lines covered. Never zero.
    pub fn line_count(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Whether `line` falls inside this range.
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

// ---------------------------------------------------------------------------
// Blame entries
// ---------------------------------------------------------------------------

/// Attribution for one physical line on one reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameEntry {
    /// 1-based line number in the snapshot that was blamed.
    pub line: u32,
    /// Full commit id that last modified the line.
    pub commit_id: String,
    /// Whether the attributed commit is a merge. The resolver guarantees
    /// this is false for every entry it hands to the classifier.
    pub is_merge: bool,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Author timestamp.
    pub timestamp: DateTime<Utc>,
    /// Commit subject line.
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Attributed commits
// ---------------------------------------------------------------------------

/// Which branch history a divergent edit was observed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// The final reportable unit: a commit that caused divergence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributedCommit {
    pub commit_id: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    /// Side(s) on which this commit's divergent edit was observed.
    pub sides: BTreeSet<Side>,
}

impl AttributedCommit {
    /// Abbreviated commit id for display.
    pub fn short_id(&self) -> &str {
        if self.commit_id.len() > 8 {
            &self.commit_id[..8]
        } else {
            &self.commit_id
        }
    }

    /// Merge another observation of the same commit into this one.
    pub fn absorb(&mut self, other: &AttributedCommit) {
        self.sides.extend(other.sides.iter().copied());
    }
}

/// Ordering for the final commit list: descending recency, ties broken by
/// lexical commit id so output is deterministic.
pub fn commit_ordering(a: &AttributedCommit, b: &AttributedCommit) -> std::cmp::Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| a.commit_id.cmp(&b.commit_id))
}

// ---------------------------------------------------------------------------
// Analysis result
// ---------------------------------------------------------------------------

/// A per-path pipeline failure that degraded the result without aborting
/// the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathError {
    pub path: String,
    pub reason: String,
}

/// The complete output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Paths the simulated merge could not auto-resolve.
    pub conflicted_paths: Vec<ConflictedPath>,
    /// Divergence-causing commits, deduplicated and recency-ordered.
    pub attributed_commits: Vec<AttributedCommit>,
    /// Regions for which no commit could be found on either side.
    pub unattributed_ranges: Vec<(String, LineRange)>,
    /// Paths whose pipeline failed or timed out.
    pub path_errors: Vec<PathError>,
}

impl AnalysisResult {
    /// True when the prospective merge is clean.
    pub fn is_clean(&self) -> bool {
        self.conflicted_paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit(id: &str, secs: i64) -> AttributedCommit {
        AttributedCommit {
            commit_id: id.to_string(),
            author: "a".into(),
            email: "a@example.com".into(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            summary: "s".into(),
            sides: BTreeSet::from([Side::Source]),
        }
    }

    #[test]
    fn test_line_range_clamps() {
        let r = LineRange::new(7, 3);
        assert_eq!(r.start, 3);
        assert_eq!(r.end, 7);
        assert_eq!(r.line_count(), 5);
        assert!(r.contains(3));
        assert!(r.contains(7));
        assert!(!r.contains(8));
    }

    #[test]
    fn test_line_range_display() {
        assert_eq!(LineRange::new(5, 5).to_string(), "5");
        assert_eq!(LineRange::new(2, 9).to_string(), "2-9");
    }

    #[test]
    fn test_commit_ordering_recency_then_id() {
        let mut commits = vec![commit("bbb", 100), commit("aaa", 100), commit("ccc", 200)];
        commits.sort_by(commit_ordering);
        let ids: Vec<&str> = commits.iter().map(|c| c.commit_id.as_str()).collect();
        assert_eq!(ids, vec!["ccc", "aaa", "bbb"]);
    }

    #[test]
    fn test_absorb_merges_sides() {
        let mut a = commit("aaa", 1);
        let mut b = commit("aaa", 1);
        b.sides = BTreeSet::from([Side::Target]);
        a.absorb(&b);
        assert!(a.sides.contains(&Side::Source));
        assert!(a.sides.contains(&Side::Target));
    }

    #[test]
    fn test_short_id() {
        let c = commit("0123456789abcdef", 1);
        assert_eq!(c.short_id(), "01234567");
    }
}
