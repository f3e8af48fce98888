//! Conflict region extraction.
//!
//! For each conflicted path this module produces the ordered set of regions
//! where the two sides truly diverge. Two independent two-way line diffs
//! (base to source, base to target) are projected onto base coordinates;
//! edits from opposite sides that overlap there are clustered into one
//! region. A region remembers the line ranges *in each side's own snapshot*
//! whose lines the blame resolver must attribute, plus a reportable range.
//!
//! When the simulator produced a marked merge preview, the marker block
//! boundaries supply the reported ranges directly; otherwise the reported
//! range falls back to side coordinates.
//!
//! Base-coordinate projection uses a doubled axis: line `n` sits at `2n`,
//! the gap after line `n` at `2n + 1`. A pure insertion occupies a single
//! gap position, so two insertions collide only at the same gap and an
//! insertion inside a deleted span collides with the deletion, while edits
//! that merely touch end-to-end stay separate (gap tolerance 0).

use diffy::{Line, Patch};
use tracing::debug;

use crate::models::LineRange;

/// One conflicting region of one path.
#[derive(Debug, Clone)]
pub struct ConflictRegion {
    /// Range shown in reports: marker coordinates when available, otherwise
    /// side-snapshot coordinates.
    pub reported: LineRange,
    /// Lines of the region in the source snapshot; `None` when the source
    /// side only deleted here.
    pub source: Option<LineRange>,
    /// Lines of the region in the target snapshot; `None` when the target
    /// side only deleted here.
    pub target: Option<LineRange>,
}

/// Which side of the merge an edit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditSide {
    Source,
    Target,
}

/// A contiguous edit relative to base, in doubled base coordinates.
#[derive(Debug, Clone)]
struct Edit {
    side: EditSide,
    /// Inclusive doubled-axis base span.
    lo: u32,
    hi: u32,
    /// Lines this edit occupies in its own side's snapshot; `None` for a
    /// pure deletion.
    lines: Option<LineRange>,
}

/// Extract the conflict regions for one path.
///
/// `None` content means the file is absent on that side (delete/modify or
/// rename fallout); a missing base is treated as empty (both sides added).
pub fn extract_regions(
    source_text: Option<&str>,
    target_text: Option<&str>,
    base_text: Option<&str>,
    merged_preview: Option<&str>,
) -> Vec<ConflictRegion> {
    let mut regions = match (source_text, target_text) {
        (None, None) => Vec::new(),
        // Delete/modify: the surviving side gets synthetic regions covering
        // what it changed since base, so blame answers with the commits that
        // collided with the deletion rather than the file's whole history.
        (Some(text), None) => surviving_regions(text, base_text, EditSide::Source),
        (None, Some(text)) => surviving_regions(text, base_text, EditSide::Target),
        (Some(source), Some(target)) => {
            let base = base_text.unwrap_or("");
            let mut edits = side_edits(base, source, EditSide::Source);
            edits.extend(side_edits(base, target, EditSide::Target));
            cluster(edits)
        }
    };

    // Marker boundaries are higher fidelity when they line up one-to-one
    // with the derived regions.
    if let Some(preview) = merged_preview {
        let marks = parse_marker_ranges(preview);
        if marks.len() == regions.len() {
            for (region, mark) in regions.iter_mut().zip(marks) {
                region.reported = mark;
            }
        } else if !marks.is_empty() {
            debug!(
                derived = regions.len(),
                marked = marks.len(),
                "marker blocks do not pair with derived regions; keeping side coordinates"
            );
        }
    }

    regions.sort_by_key(|r| r.reported);
    regions
}

/// Regions for the side that still has the file in a delete/modify
/// conflict: one region per run of lines changed since base. Without a base
/// (or when the side kept no changed lines) a single range spanning the
/// whole file stands in.
fn surviving_regions(text: &str, base_text: Option<&str>, side: EditSide) -> Vec<ConflictRegion> {
    let ranges: Vec<LineRange> = match base_text {
        Some(base) => side_edits(base, text, side)
            .into_iter()
            .filter_map(|edit| edit.lines)
            .collect(),
        None => Vec::new(),
    };

    let ranges = if ranges.is_empty() {
        let lines = text.lines().count() as u32;
        if lines == 0 {
            return Vec::new();
        }
        vec![LineRange::new(1, lines)]
    } else {
        ranges
    };

    ranges
        .into_iter()
        .map(|range| {
            let (source, target) = match side {
                EditSide::Source => (Some(range), None),
                EditSide::Target => (None, Some(range)),
            };
            ConflictRegion {
                reported: range,
                source,
                target,
            }
        })
        .collect()
}

/// Collect one side's edits relative to base from a two-way line diff.
fn side_edits(base: &str, side_text: &str, side: EditSide) -> Vec<Edit> {
    let patch: Patch<'_, str> = diffy::create_patch(base, side_text);
    let mut edits = Vec::new();

    for hunk in patch.hunks() {
        // `next_old` is the next unconsumed base line. A zero-length old
        // range names the line *before* the hunk (unified diff convention).
        let old = hunk.old_range();
        let mut next_old = if old.len() == 0 {
            old.start() as u32 + 1
        } else {
            old.start() as u32
        };
        let mut next_new = if hunk.new_range().len() == 0 {
            hunk.new_range().start() as u32 + 1
        } else {
            hunk.new_range().start() as u32
        };

        let mut run_deletes: u32 = 0;
        let mut run_inserts: u32 = 0;
        let mut run_old_start: u32 = 0;
        let mut run_new_start: u32 = 0;

        let flush = |deletes: u32,
                         inserts: u32,
                         old_start: u32,
                         new_start: u32,
                         edits: &mut Vec<Edit>| {
            if deletes == 0 && inserts == 0 {
                return;
            }
            let (lo, hi) = if deletes > 0 {
                (2 * old_start, 2 * (old_start + deletes - 1))
            } else {
                // Pure insertion: the gap after the previous base line.
                let gap = 2 * (old_start - 1) + 1;
                (gap, gap)
            };
            let lines = if inserts > 0 {
                Some(LineRange::new(new_start, new_start + inserts - 1))
            } else {
                None
            };
            edits.push(Edit {
                side,
                lo,
                hi,
                lines,
            });
        };

        for line in hunk.lines() {
            match line {
                Line::Context(_) => {
                    flush(
                        run_deletes,
                        run_inserts,
                        run_old_start,
                        run_new_start,
                        &mut edits,
                    );
                    run_deletes = 0;
                    run_inserts = 0;
                    next_old += 1;
                    next_new += 1;
                }
                Line::Delete(_) => {
                    if run_deletes == 0 && run_inserts == 0 {
                        run_old_start = next_old;
                        run_new_start = next_new;
                    }
                    run_deletes += 1;
                    next_old += 1;
                }
                Line::Insert(_) => {
                    if run_deletes == 0 && run_inserts == 0 {
                        run_old_start = next_old;
                        run_new_start = next_new;
                    }
                    run_inserts += 1;
                    next_new += 1;
                }
            }
        }
        flush(
            run_deletes,
            run_inserts,
            run_old_start,
            run_new_start,
            &mut edits,
        );
    }

    edits
}

/// Cluster overlapping edits from both sides; clusters with edits from only
/// one side are auto-mergeable and dropped.
fn cluster(mut edits: Vec<Edit>) -> Vec<ConflictRegion> {
    if edits.is_empty() {
        return Vec::new();
    }
    edits.sort_by_key(|e| (e.lo, e.hi));

    let mut regions = Vec::new();
    let mut bucket: Vec<Edit> = Vec::new();
    let mut bucket_hi = 0u32;

    for edit in edits {
        if bucket.is_empty() || edit.lo <= bucket_hi {
            bucket_hi = bucket_hi.max(edit.hi);
            bucket.push(edit);
        } else {
            if let Some(region) = region_from_bucket(&bucket) {
                regions.push(region);
            }
            bucket_hi = edit.hi;
            bucket = vec![edit];
        }
    }
    if let Some(region) = region_from_bucket(&bucket) {
        regions.push(region);
    }

    regions
}

fn region_from_bucket(bucket: &[Edit]) -> Option<ConflictRegion> {
    let source = union_side(bucket, EditSide::Source)?;
    let target = union_side(bucket, EditSide::Target)?;

    // A bucket only conflicts when both sides edited it.
    let reported = source
        .or(target)
        .unwrap_or_else(|| base_span(bucket));
    Some(ConflictRegion {
        reported,
        source,
        target,
    })
}

/// Union of one side's edited line ranges within a bucket.
///
/// Outer `None` means the side has no edits here (bucket is one-sided, not
/// a conflict); inner `None` means the side edited but kept no lines.
fn union_side(bucket: &[Edit], side: EditSide) -> Option<Option<LineRange>> {
    let mut any = false;
    let mut span: Option<LineRange> = None;
    for edit in bucket.iter().filter(|e| e.side == side) {
        any = true;
        if let Some(lines) = edit.lines {
            span = Some(match span {
                None => lines,
                Some(s) => LineRange::new(s.start.min(lines.start), s.end.max(lines.end)),
            });
        }
    }
    if any {
        Some(span)
    } else {
        None
    }
}

/// Base-coordinate span of a bucket, for the rare region where both sides
/// only deleted (no surviving lines anywhere).
fn base_span(bucket: &[Edit]) -> LineRange {
    let lo = bucket.iter().map(|e| e.lo).min().unwrap_or(2);
    let hi = bucket.iter().map(|e| e.hi).max().unwrap_or(2);
    LineRange::new((lo / 2).max(1), (hi / 2).max(1))
}

/// Parse `<<<<<<<` / `>>>>>>>` block boundaries out of a marked merge
/// preview. Returns 1-based inclusive line ranges of each block.
pub fn parse_marker_ranges(merged: &str) -> Vec<LineRange> {
    let mut ranges = Vec::new();
    let mut block_start: Option<u32> = None;

    for (idx, line) in merged.lines().enumerate() {
        let line_no = idx as u32 + 1;
        if line.starts_with("<<<<<<<") {
            block_start = Some(line_no);
        } else if line.starts_with(">>>>>>>") {
            if let Some(start) = block_start.take() {
                ranges.push(LineRange::new(start, line_no));
            }
        }
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\n";

    fn replace_line(text: &str, line: u32, with: &str) -> String {
        text.lines()
            .enumerate()
            .map(|(i, l)| {
                if i as u32 + 1 == line {
                    with.to_string()
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    #[test]
    fn test_same_line_changed_both_sides() {
        let source = replace_line(BASE, 5, "five-source");
        let target = replace_line(BASE, 5, "five-target");
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, Some(LineRange::new(5, 5)));
        assert_eq!(regions[0].target, Some(LineRange::new(5, 5)));
    }

    #[test]
    fn test_disjoint_changes_are_not_conflicts() {
        let source = replace_line(BASE, 1, "ONE");
        let target = replace_line(BASE, 8, "EIGHT");
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_adjacent_changes_do_not_merge() {
        // Source edits line 4, target edits line 5: touching but not
        // overlapping, so no conflict (gap tolerance 0).
        let source = replace_line(BASE, 4, "FOUR");
        let target = replace_line(BASE, 5, "FIVE");
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_overlapping_multiline_changes() {
        let source = {
            let s = replace_line(BASE, 4, "FOUR-src");
            replace_line(&s, 5, "FIVE-src")
        };
        let target = {
            let t = replace_line(BASE, 5, "FIVE-tgt");
            replace_line(&t, 6, "SIX-tgt")
        };
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, Some(LineRange::new(4, 5)));
        assert_eq!(regions[0].target, Some(LineRange::new(5, 6)));
    }

    #[test]
    fn test_delete_vs_modify_line() {
        // Source deletes line 5 entirely; target rewrites it.
        let source = BASE
            .lines()
            .filter(|l| *l != "five")
            .collect::<Vec<_>>()
            .join("\n")
            + "\n";
        let target = replace_line(BASE, 5, "five-target");
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, None);
        assert_eq!(regions[0].target, Some(LineRange::new(5, 5)));
    }

    #[test]
    fn test_insertions_at_same_gap_conflict() {
        let mut source_lines: Vec<&str> = BASE.lines().collect();
        source_lines.insert(4, "inserted-by-source");
        let source = source_lines.join("\n") + "\n";

        let mut target_lines: Vec<&str> = BASE.lines().collect();
        target_lines.insert(4, "inserted-by-target");
        let target = target_lines.join("\n") + "\n";

        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, Some(LineRange::new(5, 5)));
        assert_eq!(regions[0].target, Some(LineRange::new(5, 5)));
    }

    #[test]
    fn test_deleted_side_regions_cover_survivor_changes() {
        // Target deleted the file; source appended a line since base. Only
        // the appended line needs attribution, not the whole history.
        let regions = extract_regions(Some("a\nb\nc\n"), None, Some("a\nb\n"), None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, Some(LineRange::new(3, 3)));
        assert_eq!(regions[0].target, None);
        assert_eq!(regions[0].reported, LineRange::new(3, 3));
    }

    #[test]
    fn test_deleted_side_without_base_spans_whole_file() {
        let regions = extract_regions(Some("a\nb\nc\n"), None, None, None);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, Some(LineRange::new(1, 3)));
        assert_eq!(regions[0].target, None);
    }

    #[test]
    fn test_both_sides_absent_yields_nothing() {
        assert!(extract_regions(None, None, Some(BASE), None).is_empty());
    }

    #[test]
    fn test_regions_sorted_and_disjoint() {
        let source = {
            let s = replace_line(BASE, 2, "TWO-src");
            replace_line(&s, 7, "SEVEN-src")
        };
        let target = {
            let t = replace_line(BASE, 2, "TWO-tgt");
            replace_line(&t, 7, "SEVEN-tgt")
        };
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), None);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].reported.end < regions[1].reported.start);
    }

    #[test]
    fn test_marker_ranges_override_reported() {
        let source = replace_line(BASE, 5, "five-source");
        let target = replace_line(BASE, 5, "five-target");
        let preview = "one\ntwo\nthree\nfour\n<<<<<<< ours\nfive-source\n=======\nfive-target\n>>>>>>> theirs\nsix\nseven\neight\n";
        let regions = extract_regions(Some(&source), Some(&target), Some(BASE), Some(preview));
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].reported, LineRange::new(5, 9));
        // Blame coordinates stay in side snapshots.
        assert_eq!(regions[0].source, Some(LineRange::new(5, 5)));
        assert_eq!(regions[0].target, Some(LineRange::new(5, 5)));
    }

    #[test]
    fn test_parse_marker_ranges() {
        let merged = "a\n<<<<<<< ours\nx\n=======\ny\n>>>>>>> theirs\nb\n<<<<<<< ours\np\n=======\nq\n>>>>>>> theirs\n";
        let ranges = parse_marker_ranges(merged);
        assert_eq!(ranges, vec![LineRange::new(2, 6), LineRange::new(8, 12)]);
    }

    #[test]
    fn test_unterminated_marker_ignored() {
        let merged = "a\n<<<<<<< ours\nx\n";
        assert!(parse_marker_ranges(merged).is_empty());
    }
}
