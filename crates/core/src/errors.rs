//! Error types for the git-mediate core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Fatal kinds (unresolvable references, a failed merge simulation) abort
//! the whole analysis; everything else degrades the result per path and is
//! reported inside [`crate::models::AnalysisResult`] instead of here.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Simulate(#[from] SimulateError),

    #[error(transparent)]
    Blame(#[from] BlameError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Repository errors
// ---------------------------------------------------------------------------

/// Errors from repository access and reference resolution.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The path does not exist or is not inside a git repository.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A ref (branch, tag, SHA) could not be resolved to a commit.
    #[error("reference not found: '{0}'")]
    RefNotFound(String),

    /// Source and target resolve to the same commit; nothing to analyze.
    #[error("source and target both resolve to {0}; checkout a different branch or pick another target")]
    SameCommit(String),

    /// A `git2` library error outside the cases above.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

// ---------------------------------------------------------------------------
// Merge simulation errors
// ---------------------------------------------------------------------------

/// Errors from the in-memory merge simulation.
#[derive(Debug, Error)]
pub enum SimulateError {
    /// The merge computation itself failed. Fatal, no fallback.
    #[error("merge simulation failed for {source}..{target}: {detail}")]
    MergeComputation {
        source: String,
        target: String,
        detail: String,
    },

    /// A `git2` library error while inspecting the simulated index.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

// ---------------------------------------------------------------------------
// Blame errors
// ---------------------------------------------------------------------------

/// Errors from the blame resolver.
///
/// A path missing at a reference is *not* an error: the resolver returns an
/// empty entry list and the classifier falls back. These variants cover the
/// cases where blame itself misbehaved.
#[derive(Debug, Error)]
pub enum BlameError {
    /// Merge-commit resolution walked a parent cycle or exceeded its bound.
    #[error("could not resolve merge commit {0} to a concrete ancestor")]
    MergeResolution(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RepoError::RefNotFound("feature/missing".into());
        assert_eq!(err.to_string(), "reference not found: 'feature/missing'");

        let err = RepoError::RepositoryNotFound("/tmp/nowhere".into());
        assert_eq!(err.to_string(), "git repository not found at '/tmp/nowhere'");

        let err = SimulateError::MergeComputation {
            source: "feature".into(),
            target: "main".into(),
            detail: "odb corrupt".into(),
        };
        assert!(err.to_string().contains("feature..main"));

        let err = ConfigError::InvalidValue {
            field: "analysis.max_parallel_paths".into(),
            detail: "must be at least 1".into(),
        };
        assert!(err.to_string().contains("max_parallel_paths"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let repo_err = RepoError::RefNotFound("x".into());
        let core_err: CoreError = repo_err.into();
        assert!(matches!(core_err, CoreError::Repo(_)));

        let blame_err = BlameError::MergeResolution("abc123".into());
        let core_err: CoreError = blame_err.into();
        assert!(matches!(core_err, CoreError::Blame(_)));
    }
}
