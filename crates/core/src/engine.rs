//! The analysis engine.
//!
//! [`AnalysisEngine`] orchestrates one analysis run:
//!
//! 1. Resolve both references and the merge base (fatal on failure).
//! 2. Simulate the merge in memory; a clean merge short-circuits.
//! 3. Run each conflicted path's pipeline (snapshot reads, region
//!    extraction, blame on both sides, classification) as an independent
//!    blocking task with its own repository handle and a bounded wait.
//! 4. Aggregate all path outcomes in a single writer: union, dedup, sort.
//!
//! A path whose pipeline fails or times out degrades to a [`PathError`];
//! it never aborts the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use git2::{Oid, Repository};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::blame::blame_ranges;
use crate::classify::{self, classify, Classification, SideFallbacks};
use crate::config::AnalyzeConfig;
use crate::errors::{CoreError, RepoError};
use crate::merge::regions::extract_regions;
use crate::merge::simulate::{simulate, SimulatedConflict};
use crate::models::{
    AnalysisResult, ConflictKind, ConflictedPath, LineRange, PathError,
};
use crate::repo::history::last_commit_touching;
use crate::repo::{read_snapshot, RepoClient};

/// The merge-conflict attribution engine.
pub struct AnalysisEngine {
    config: AnalyzeConfig,
    client: RepoClient,
}

/// Everything one path's pipeline produced.
struct PathAnalysis {
    conflicted: ConflictedPath,
    classification: Classification,
}

impl AnalysisEngine {
    /// Create an engine over an already-opened repository client.
    pub fn new(config: AnalyzeConfig, client: RepoClient) -> Self {
        Self { config, client }
    }

    /// Open the repository at `repo_path` and build an engine for it.
    pub fn open<P: AsRef<Path>>(config: AnalyzeConfig, repo_path: P) -> Result<Self, CoreError> {
        let client = RepoClient::open(repo_path)?;
        Ok(Self::new(config, client))
    }

    pub fn client(&self) -> &RepoClient {
        &self.client
    }

    /// Analyze the prospective merge of `source_ref` into `target_ref`.
    pub async fn analyze(
        &self,
        source_ref: &str,
        target_ref: &str,
    ) -> Result<AnalysisResult, CoreError> {
        let source = self.client.resolve(source_ref)?;
        let target = self.client.resolve(target_ref)?;
        self.client.ensure_distinct(source, target)?;
        let base = self.client.merge_base(source, target)?;

        info!(
            source = source_ref,
            target = target_ref,
            %base,
            "analyzing prospective merge"
        );

        let simulation = simulate(self.client.repo(), source, target)?;
        if simulation.conflicts.is_empty() {
            return Ok(AnalysisResult {
                conflicted_paths: Vec::new(),
                attributed_commits: Vec::new(),
                unattributed_ranges: Vec::new(),
                path_errors: Vec::new(),
            });
        }

        let semaphore = Arc::new(Semaphore::new(self.config.analysis.max_parallel_paths));
        let timeout = Duration::from_secs(self.config.analysis.path_timeout_secs);
        let mut tasks: JoinSet<(String, Result<PathAnalysis, String>)> = JoinSet::new();

        for conflict in simulation.conflicts {
            let semaphore = semaphore.clone();
            let git_dir: PathBuf = self.client.repo_path().to_path_buf();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let display_path = conflict.path.clone();
                let work = tokio::task::spawn_blocking(move || {
                    analyze_path(&git_dir, source, target, base, conflict)
                });
                let outcome = match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(result)) => result.map_err(|e| e.to_string()),
                    Ok(Err(join_err)) => Err(format!("pipeline panicked: {join_err}")),
                    Err(_) => Err(format!(
                        "pipeline exceeded the {}s bound",
                        timeout.as_secs()
                    )),
                };
                (display_path, outcome)
            });
        }

        // Single aggregation point: nothing below runs until a task is
        // fully done, and only this writer touches the accumulators.
        let mut conflicted_paths: Vec<ConflictedPath> = Vec::new();
        let mut classifications: Vec<Classification> = Vec::new();
        let mut unattributed_ranges: Vec<(String, LineRange)> = Vec::new();
        let mut path_errors: Vec<PathError> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(analysis))) => {
                    unattributed_ranges.extend(
                        analysis
                            .classification
                            .unattributed
                            .iter()
                            .map(|range| (path.clone(), *range)),
                    );
                    conflicted_paths.push(analysis.conflicted);
                    classifications.push(analysis.classification);
                }
                Ok((path, Err(reason))) => {
                    warn!(path = %path, reason = %reason, "path pipeline failed");
                    path_errors.push(PathError { path, reason });
                }
                Err(join_err) => {
                    warn!(error = %join_err, "path task join failed");
                    path_errors.push(PathError {
                        path: String::new(),
                        reason: join_err.to_string(),
                    });
                }
            }
        }

        conflicted_paths.sort_by(|a, b| a.path.cmp(&b.path));
        unattributed_ranges.sort();
        path_errors.sort_by(|a, b| a.path.cmp(&b.path));
        let attributed_commits = classify::aggregate(classifications);

        info!(
            paths = conflicted_paths.len(),
            commits = attributed_commits.len(),
            gaps = unattributed_ranges.len(),
            errors = path_errors.len(),
            "analysis complete"
        );

        Ok(AnalysisResult {
            conflicted_paths,
            attributed_commits,
            unattributed_ranges,
            path_errors,
        })
    }
}

/// Run the full pipeline for one conflicted path.
///
/// Opens its own repository handle: pipelines share nothing, so path-level
/// work is free to run concurrently.
fn analyze_path(
    git_dir: &Path,
    source: Oid,
    target: Oid,
    base: Oid,
    conflict: SimulatedConflict,
) -> Result<PathAnalysis, CoreError> {
    let repo = Repository::open(git_dir)
        .map_err(|_| RepoError::RepositoryNotFound(git_dir.display().to_string()))?;
    let rel_path = Path::new(&conflict.path);

    // Binary conflicts get reported without any line-level work.
    if conflict.kind == ConflictKind::Binary {
        return Ok(PathAnalysis {
            conflicted: ConflictedPath {
                path: conflict.path.clone(),
                kind: ConflictKind::Binary,
                ranges: Vec::new(),
            },
            classification: Classification::default(),
        });
    }

    let source_commit = repo.find_commit(source).map_err(RepoError::from)?;
    let target_commit = repo.find_commit(target).map_err(RepoError::from)?;
    let base_commit = repo.find_commit(base).map_err(RepoError::from)?;

    let source_snap = read_snapshot(&repo, &source_commit, rel_path)?;
    let target_snap = read_snapshot(&repo, &target_commit, rel_path)?;
    let base_snap = read_snapshot(&repo, &base_commit, rel_path)?;

    // The simulator probes blobs for binary content, but a path can still
    // turn binary on only one side; report it without line-level work.
    if [&source_snap, &target_snap, &base_snap]
        .iter()
        .any(|snap| snap.as_ref().is_some_and(|s| s.is_binary()))
    {
        return Ok(PathAnalysis {
            conflicted: ConflictedPath {
                path: conflict.path.clone(),
                kind: ConflictKind::Binary,
                ranges: Vec::new(),
            },
            classification: Classification::default(),
        });
    }

    let source_text = source_snap.as_ref().map(|s| s.text().into_owned());
    let target_text = target_snap.as_ref().map(|s| s.text().into_owned());
    let base_text = base_snap.as_ref().map(|s| s.text().into_owned());

    let regions = extract_regions(
        source_text.as_deref(),
        target_text.as_deref(),
        base_text.as_deref(),
        conflict.merged_preview.as_deref(),
    );
    debug!(path = %conflict.path, regions = regions.len(), "extracted conflict regions");

    let source_ranges: Vec<LineRange> = regions.iter().filter_map(|r| r.source).collect();
    let target_ranges: Vec<LineRange> = regions.iter().filter_map(|r| r.target).collect();

    let source_blame = blame_ranges(&repo, source, rel_path, &source_ranges)?;
    let target_blame = blame_ranges(&repo, target, rel_path, &target_ranges)?;

    // Fallback attribution is only worth computing for a side blame could
    // not speak for.
    let fallbacks = SideFallbacks {
        source: if source_blame.is_empty() {
            last_commit_touching(&repo, source, rel_path)?
        } else {
            None
        },
        target: if target_blame.is_empty() {
            last_commit_touching(&repo, target, rel_path)?
        } else {
            None
        },
    };

    let base_id = base.to_string();
    let classification = classify(
        &conflict.path,
        &regions,
        &source_blame,
        &target_blame,
        &fallbacks,
        Some(&base_id),
    );

    let conflicted = ConflictedPath {
        path: conflict.path,
        kind: conflict.kind,
        ranges: regions.iter().map(|r| r.reported).collect(),
    };

    Ok(PathAnalysis {
        conflicted,
        classification,
    })
}
