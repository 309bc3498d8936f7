//! Configuration management.
//!
//! # Environment Variables
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `RULEGUARD_MODEL` | string | `all-MiniLM-L6-v2` | Embedding model name or alias (`default`, `accurate`, `multilingual`) |
//! | `RULEGUARD_SIMILARITY_THRESHOLD` | f32 | `0.5` | Top semantic score below which keyword results are mixed in |
//! | `RULEGUARD_MIN_RESULTS` | usize | `3` | Semantic result count below which keyword results are mixed in |
//! | `RULEGUARD_MAX_RESULTS` | usize | `10` | Maximum results per query |
//! | `RULEGUARD_CACHE_TTL_SECS` | u64 | `86400` | Vector cache validity window |
//! | `RULEGUARD_CACHE_DIR` | path | platform cache dir | Vector cache directory |
//! | `RULEGUARD_BATCH_SIZE` | usize | `32` | Embedding batch size |
//! | `RULEGUARD_DEVICE` | string | auto | `cpu` or `cuda` |
//! | `RULEGUARD_INDEX_DIR` | path | unset | Where a native index is persisted after regeneration |

mod capabilities;

pub use capabilities::Capabilities;

use crate::embedding::{DEFAULT_MODEL, Device};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default similarity threshold for trusting semantic results alone.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

/// Default minimum semantic result count before keyword augmentation.
pub const DEFAULT_MIN_RESULTS: usize = 3;

/// Default maximum results returned per query.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Default embedding batch size.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default vector cache validity window (24 hours).
pub const DEFAULT_CACHE_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for the semantic rule matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Embedding model name or alias.
    pub model_name: String,
    /// Top semantic score below which keyword results are mixed in.
    pub similarity_threshold: f32,
    /// Semantic result count below which keyword results are mixed in.
    pub min_results: usize,
    /// Maximum number of results per query.
    pub max_results: usize,
    /// How long a saved vector cache stays valid.
    pub cache_validity_window: Duration,
    /// Directory holding the vector cache artifacts.
    pub cache_dir: PathBuf,
    /// Number of texts embedded per backend call.
    pub batch_size: usize,
    /// Device to report instead of detecting one; does not change where the
    /// model runs.
    pub device: Option<Device>,
    /// Directory a native index is written to after regeneration.
    pub index_dir: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Embedding model name or alias.
    pub model_name: Option<String>,
    /// Similarity threshold.
    pub similarity_threshold: Option<f32>,
    /// Minimum results.
    pub min_results: Option<usize>,
    /// Maximum results.
    pub max_results: Option<usize>,
    /// Cache validity window in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// Cache directory.
    pub cache_dir: Option<String>,
    /// Embedding batch size.
    pub batch_size: Option<usize>,
    /// Device (`cpu` or `cuda`).
    pub device: Option<String>,
    /// Native index directory.
    pub index_dir: Option<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_results: DEFAULT_MIN_RESULTS,
            max_results: DEFAULT_MAX_RESULTS,
            cache_validity_window: DEFAULT_CACHE_VALIDITY,
            cache_dir: default_cache_dir(),
            batch_size: DEFAULT_BATCH_SIZE,
            device: None,
            index_dir: None,
        }
    }
}

impl MatcherConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from defaults plus environment overrides.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Sets the model name or alias.
    #[must_use]
    pub fn with_model(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it holds
    /// out-of-range values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let config = Self::from_config_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location, then applies
    /// environment overrides.
    ///
    /// Checks `<config_dir>/ruleguard/config.toml`, then
    /// `~/.config/ruleguard/config.toml`. Returns defaults if neither exists
    /// or parses.
    #[must_use]
    pub fn load_default() -> Self {
        let from_file = directories::BaseDirs::new().and_then(|base_dirs| {
            let candidates = [
                base_dirs.config_dir().join("ruleguard").join("config.toml"),
                base_dirs
                    .home_dir()
                    .join(".config")
                    .join("ruleguard")
                    .join("config.toml"),
            ];
            candidates
                .iter()
                .filter(|p| p.exists())
                .find_map(|p| match Self::load_from_file(p) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!(path = %p.display(), error = %e, "Ignoring config file");
                        None
                    },
                })
        });

        from_file.unwrap_or_default().with_env_overrides()
    }

    /// Applies `RULEGUARD_*` environment variables on top of this config.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("RULEGUARD_MODEL") {
            if !v.trim().is_empty() {
                self.model_name = v.trim().to_string();
            }
        }
        if let Some(v) = env_parse("RULEGUARD_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
        if let Some(v) = env_parse("RULEGUARD_MIN_RESULTS") {
            self.min_results = v;
        }
        if let Some(v) = env_parse("RULEGUARD_MAX_RESULTS") {
            self.max_results = v;
        }
        if let Some(secs) = env_parse::<u64>("RULEGUARD_CACHE_TTL_SECS") {
            self.cache_validity_window = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("RULEGUARD_CACHE_DIR") {
            if !v.trim().is_empty() {
                self.cache_dir = PathBuf::from(v.trim());
            }
        }
        if let Some(v) = env_parse("RULEGUARD_BATCH_SIZE") {
            self.batch_size = v;
        }
        if let Some(device) = std::env::var("RULEGUARD_DEVICE")
            .ok()
            .and_then(|v| Device::parse(&v))
        {
            self.device = Some(device);
        }
        if let Ok(v) = std::env::var("RULEGUARD_INDEX_DIR") {
            if !v.trim().is_empty() {
                self.index_dir = Some(PathBuf::from(v.trim()));
            }
        }
        self
    }

    /// Checks that values are in range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the threshold is outside
    /// `[-1, 1]` or when `max_results` or `batch_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidInput(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(Error::InvalidInput(
                "max_results must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidInput(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts a `ConfigFile` to `MatcherConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(model_name) = file.model_name {
            config.model_name = model_name;
        }
        if let Some(threshold) = file.similarity_threshold {
            config.similarity_threshold = threshold;
        }
        if let Some(min_results) = file.min_results {
            config.min_results = min_results;
        }
        if let Some(max_results) = file.max_results {
            config.max_results = max_results;
        }
        if let Some(secs) = file.cache_ttl_secs {
            config.cache_validity_window = Duration::from_secs(secs);
        }
        if let Some(dir) = file.cache_dir {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(batch_size) = file.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(device) = file.device.as_deref().and_then(Device::parse) {
            config.device = Some(device);
        }
        if let Some(dir) = file.index_dir {
            config.index_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

/// Returns the platform cache directory for vectors.
///
/// `~/.cache/ruleguard/semantic_vectors` on Linux; `.ruleguard/cache` when no
/// home directory can be determined.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".ruleguard").join("cache"),
        |dirs| dirs.cache_dir().join("ruleguard").join("semantic_vectors"),
    )
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert!((config.similarity_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.min_results, 3);
        assert_eq!(config.max_results, 10);
        assert_eq!(config.cache_validity_window, Duration::from_secs(86_400));
        assert_eq!(config.batch_size, 32);
        assert!(config.index_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r#"
model_name = "accurate"
similarity_threshold = 0.6
max_results = 5
cache_ttl_secs = 60
device = "cpu"
"#
        )
        .expect("write");

        let config = MatcherConfig::load_from_file(file.path()).expect("load");
        assert_eq!(config.model_name, "accurate");
        assert!((config.similarity_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.max_results, 5);
        assert_eq!(config.min_results, 3);
        assert_eq!(config.cache_validity_window, Duration::from_secs(60));
        assert_eq!(config.device, Some(Device::Cpu));
    }

    #[test]
    fn test_load_from_file_rejects_out_of_range() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "similarity_threshold = 3.0").expect("write");

        let result = MatcherConfig::load_from_file(file.path());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = MatcherConfig::load_from_file(Path::new("/nonexistent/ruleguard.toml"));
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_validate_zero_max_results() {
        let config = MatcherConfig {
            max_results: 0,
            ..MatcherConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
