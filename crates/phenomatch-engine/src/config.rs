use crate::engine::MatcherOptions;
use phenomatch_core::dataset::sibling_profiles;
use phenomatch_core::{DataSource, DEFAULT_TOP_N};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Profile file looked up next to the dataset when none is configured.
pub const DEFAULT_PROFILES_FILE: &str = "morphology-profiles.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Engine configuration: defaults, then an optional TOML file, then
/// `PHENOMATCH_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Phenotype dataset file (default: list.json).
    pub dataset: PathBuf,
    /// Morphology profile file (default: morphology-profiles.json next to the dataset).
    pub profiles: Option<PathBuf>,
    /// Number of matches returned when the caller does not specify one.
    pub top_n: usize,
    /// Whether to run loading and matching on a dedicated worker thread.
    pub offload: bool,
    /// Capacity of the worker request channel.
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("list.json"),
            profiles: None,
            top_n: DEFAULT_TOP_N,
            offload: true,
            queue_depth: 16,
        }
    }
}

impl Config {
    /// Load configuration from `PHENOMATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Load an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        Ok(base.with_env())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn with_env(self) -> Self {
        Self {
            dataset: std::env::var("PHENOMATCH_DATASET")
                .map(PathBuf::from)
                .unwrap_or(self.dataset),
            profiles: std::env::var("PHENOMATCH_PROFILES")
                .map(PathBuf::from)
                .ok()
                .or(self.profiles),
            top_n: env_usize("PHENOMATCH_TOP_N", self.top_n),
            offload: std::env::var("PHENOMATCH_OFFLOAD")
                .map(|v| v != "0")
                .unwrap_or(self.offload),
            queue_depth: env_usize("PHENOMATCH_QUEUE_DEPTH", self.queue_depth),
        }
    }

    /// Profile file to load: the configured one, or the dataset's sibling.
    pub fn profiles_path(&self) -> PathBuf {
        self.profiles
            .clone()
            .unwrap_or_else(|| sibling_profiles(&self.dataset, DEFAULT_PROFILES_FILE))
    }

    pub fn data_source(&self) -> DataSource {
        DataSource::new(&self.dataset).with_profiles(self.profiles_path())
    }

    pub fn matcher_options(&self) -> MatcherOptions {
        MatcherOptions {
            offload: self.offload,
            queue_depth: self.queue_depth.max(1),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
