//! Configuration loading for topic tracking sessions.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/tdt/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TdtError;

/// Settings for the batch pipeline (network, info values, facets).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Vertices scoring above this value are informative.
    #[serde(default = "default_info_threshold")]
    pub info_threshold: f64,

    /// How many days before a window's begin date an unused document
    /// may still be rescanned.
    #[serde(default = "default_rescan_limit_days")]
    pub rescan_limit_days: u32,

    /// Baseline word list (closed-class terms), optional.
    #[serde(default)]
    pub baseline_path: Option<String>,

    /// Section of the baseline list to use.
    #[serde(default = "default_baseline_language")]
    pub baseline_language: String,

    /// Suffix identifying tokenized input files.
    #[serde(default = "default_token_file_suffix")]
    pub token_file_suffix: String,

    /// Files between checkpoint writes.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
}

fn default_info_threshold() -> f64 {
    0.1
}

fn default_rescan_limit_days() -> u32 {
    30
}

fn default_baseline_language() -> String {
    "en".to_string()
}

fn default_token_file_suffix() -> String {
    "tok.json".to_string()
}

fn default_checkpoint_every() -> usize {
    25
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            info_threshold: default_info_threshold(),
            rescan_limit_days: default_rescan_limit_days(),
            baseline_path: None,
            baseline_language: default_baseline_language(),
            token_file_suffix: default_token_file_suffix(),
            checkpoint_every: default_checkpoint_every(),
        }
    }
}

impl PipelineSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.info_threshold.is_finite() || self.info_threshold < 0.0 {
            return Err(format!(
                "info_threshold must be a non-negative number, got {}",
                self.info_threshold
            ));
        }
        if self.token_file_suffix.is_empty() {
            return Err("token_file_suffix must not be empty".to_string());
        }
        if self.checkpoint_every == 0 {
            return Err("checkpoint_every must be > 0".to_string());
        }
        Ok(())
    }
}

/// Settings for query resolution and similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Minimum core number kept by core reduction.
    #[serde(default = "default_core_number")]
    pub core_number: u32,

    /// Blend between vertex overlap (1.0) and walk overlap (0.0).
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Similarity to a prototype needed to join its cluster.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,

    /// Maximum documents reported over all clusters.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_core_number() -> u32 {
    2
}

fn default_alpha() -> f64 {
    0.5
}

fn default_cluster_threshold() -> f64 {
    0.2
}

fn default_max_results() -> usize {
    50
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            core_number: default_core_number(),
            alpha: default_alpha(),
            cluster_threshold: default_cluster_threshold(),
            max_results: default_max_results(),
        }
    }
}

impl RetrievalSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(format!("alpha must be 0.0-1.0, got {}", self.alpha));
        }
        if !(0.0..=1.0).contains(&self.cluster_threshold) {
            return Err(format!(
                "cluster_threshold must be 0.0-1.0, got {}",
                self.cluster_threshold
            ));
        }
        if self.max_results == 0 {
            return Err("max_results must be > 0".to_string());
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB store
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Document community the store belongs to
    #[serde(default = "default_community")]
    pub community: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Batch pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "tdt")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_community() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            community: default_community(),
            log_level: default_log_level(),
            pipeline: PipelineSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/tdt/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (TDT_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TdtError> {
        let config_dir = ProjectDirs::from("", "", "tdt")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| TdtError::Config(e.to_string()))?
            .set_default("community", default_community())
            .map_err(|e| TdtError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| TdtError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: TDT_DB_PATH, TDT_PIPELINE__INFO_THRESHOLD, ...
        builder = builder.add_source(
            Environment::with_prefix("TDT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| TdtError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| TdtError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), TdtError> {
        self.pipeline.validate().map_err(TdtError::Config)?;
        self.retrieval.validate().map_err(TdtError::Config)?;
        Ok(())
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.community, "default");
        assert_eq!(settings.log_level, "info");
        assert!((settings.pipeline.info_threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(settings.pipeline.rescan_limit_days, 30);
        assert_eq!(settings.retrieval.core_number, 2);
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.pipeline.token_file_suffix, "tok.json");
    }

    #[test]
    fn test_pipeline_validation() {
        let mut config = PipelineSettings::default();
        assert!(config.validate().is_ok());

        config.info_threshold = -1.0;
        assert!(config.validate().is_err());

        config.info_threshold = 0.2;
        config.checkpoint_every = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retrieval_validation() {
        let mut config = RetrievalSettings::default();
        assert!(config.validate().is_ok());

        config.alpha = 1.5;
        assert!(config.validate().is_err());

        config.alpha = 0.5;
        config.max_results = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expanded_db_path_plain() {
        let settings = Settings {
            db_path: "/var/lib/tdt".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.expanded_db_path(), PathBuf::from("/var/lib/tdt"));
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.retrieval.max_results, settings.retrieval.max_results);
    }
}
