use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub matching: MatchingConfig,
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("chronique.db"),
            matching: MatchingConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Thresholds for the title/author matching phases. Calibrated against
/// the typo and truncation cases observed in real show summaries; kept
/// in config so a corpus recalibration does not need a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum normalized Levenshtein similarity on titles alone.
    pub fuzzy_threshold: f64,
    /// Minimum weighted title+author similarity for the last phase.
    pub combined_threshold: f64,
    pub title_weight: f64,
    pub author_weight: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.82,
            combined_threshold: 0.75,
            title_weight: 0.6,
            author_weight: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "chronique/0.1".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert!(cfg.matching.fuzzy_threshold > cfg.matching.combined_threshold);
        assert!((cfg.matching.title_weight + cfg.matching.author_weight - 1.0).abs() < 1e-9);
        assert_eq!(cfg.fetch.timeout_secs, 10);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            database_path = "/tmp/test.db"

            [matching]
            fuzzy_threshold = 0.9
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(cfg.matching.fuzzy_threshold, 0.9);
        // untouched keys keep their defaults
        assert_eq!(cfg.matching.title_weight, 0.6);
        assert_eq!(cfg.fetch.user_agent, "chronique/0.1");
    }
}
