//! TOML-based configuration for git-mediate.
//!
//! Every field has a default, so the tool runs with no config file at all;
//! a file only overrides the knobs it names.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Application configuration, loaded from an optional TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// Analysis behaviour settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Analysis behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Bounded wait, in seconds, for a single path's pipeline (default 30).
    /// A path exceeding this degrades to a path error; the run continues.
    #[serde(default = "default_path_timeout")]
    pub path_timeout_secs: u64,

    /// Maximum number of path pipelines run concurrently (default 4).
    #[serde(default = "default_max_parallel")]
    pub max_parallel_paths: usize,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_path_timeout() -> u64 {
    30
}
fn default_max_parallel() -> usize {
    4
}
fn default_log_level() -> String {
    "warn".into()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            path_timeout_secs: default_path_timeout(),
            max_parallel_paths: default_max_parallel(),
            log_level: default_log_level(),
        }
    }
}

impl AnalyzeConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        debug!(
            timeout = config.analysis.path_timeout_secs,
            parallel = config.analysis.max_parallel_paths,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Validate field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_parallel_paths == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.max_parallel_paths".into(),
                detail: "must be at least 1".into(),
            });
        }
        if self.analysis.path_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.path_timeout_secs".into(),
                detail: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyzeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.path_timeout_secs, 30);
        assert_eq!(config.analysis.max_parallel_paths, 4);
        assert_eq!(config.analysis.log_level, "warn");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: AnalyzeConfig = toml::from_str(
            r#"
            [analysis]
            max_parallel_paths = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.analysis.max_parallel_paths, 8);
        assert_eq!(config.analysis.path_timeout_secs, 30);
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let config: AnalyzeConfig = toml::from_str(
            r#"
            [analysis]
            max_parallel_paths = 0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = AnalyzeConfig::load_from_file("/nonexistent/mediate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
