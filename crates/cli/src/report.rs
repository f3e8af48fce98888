//! Human-facing report rendering for an analysis result.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use git_mediate_core::models::{AnalysisResult, AttributedCommit, Side};

use crate::style;

/// Render the full report to stdout.
pub fn render(result: &AnalysisResult) {
    if result.is_clean() {
        println!();
        println!("{}", style::success("No conflicts detected."));
        println!();
        return;
    }

    println!();
    println!(
        "{}",
        style::header(&format!(
            "Conflicts found in {} file{}",
            result.conflicted_paths.len(),
            if result.conflicted_paths.len() == 1 { "" } else { "s" }
        ))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Kind", "Lines"]);

    for conflicted in &result.conflicted_paths {
        let ranges = if conflicted.ranges.is_empty() {
            "-".to_string()
        } else {
            conflicted
                .ranges
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(vec![
            Cell::new(&conflicted.path),
            Cell::new(conflicted.kind.to_string()),
            Cell::new(ranges),
        ]);
    }
    println!("{}", table);

    if result.attributed_commits.is_empty() {
        println!();
        println!(
            "{}",
            style::warn("Could not identify the specific commits causing these conflicts.")
        );
        println!(
            "{}",
            style::dim("This could be due to complex merge history or very old commits.")
        );
    } else {
        println!();
        println!("{}", style::header("Commits causing these conflicts"));
        for commit in &result.attributed_commits {
            println!();
            render_commit(commit);
        }
    }

    for (path, range) in &result.unattributed_ranges {
        println!();
        println!(
            "{}",
            style::warn(&format!("{}: lines {} could not be attributed", path, range))
        );
    }

    for error in &result.path_errors {
        println!();
        println!(
            "{}",
            style::error(&format!("{}: {}", error.path, error.reason))
        );
    }

    println!();
}

/// Clip a commit subject so one pathological message cannot wreck the layout.
fn clip_subject(subject: &str) -> String {
    const MAX: usize = 80;
    if subject.chars().count() > MAX {
        let clipped: String = subject.chars().take(MAX - 3).collect();
        format!("{clipped}...")
    } else {
        subject.to_string()
    }
}

fn render_commit(commit: &AttributedCommit) {
    let sides = commit
        .sides
        .iter()
        .map(|side| match side {
            Side::Source => style::source_ref("source"),
            Side::Target => style::target_ref("target"),
        })
        .collect::<Vec<_>>()
        .join(", ");

    println!("  {}", style::header(&clip_subject(&commit.summary)));
    println!("  Author: {} <{}>", commit.author, commit.email);
    println!(
        "  Date:   {}",
        commit.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  SHA:    {}", style::dim(&commit.commit_id));
    println!("  Side:   {}", sides);
}
