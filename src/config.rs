//! Driver configuration using Figment.
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. built-in defaults ([`PyramidConfig::default`])
//! 2. `config/pyramid.toml` (or the file passed to [`PyramidConfig::load_from`];
//!    a missing file is skipped)
//! 3. environment variables prefixed with `MODE_PYRAMID_`, nested keys split
//!    on `__` (e.g. `MODE_PYRAMID_ENGINE__WORKERS=4`)
//!
//! The library core never reads configuration; only the binary and
//! [`Downsampler::from_config`](crate::Downsampler::from_config) consume it.
//!
//! # Example
//! ```no_run
//! use mode_pyramid::config::PyramidConfig;
//!
//! let config = PyramidConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), mode_pyramid::PyramidError>(())
//! ```

use crate::engine::Strategy;
use crate::error::{AppResult, PyramidError};
use crate::grid::Sample;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/pyramid.toml";

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "MODE_PYRAMID_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyramidConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Downsampling engine settings
    pub engine: EngineConfig,
    /// Where and how result grids are written
    pub output: OutputConfig,
    /// Random grid generation
    pub synth: SynthConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads per level (0 = one per hardware thread)
    pub workers: usize,
    /// Level chaining strategy (reduce or rescan)
    pub strategy: Strategy,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving CSV files
    pub directory: PathBuf,
    /// Prefix file names with a `%Y%m%d%H%M%S` timestamp
    pub timestamped: bool,
    /// Also write the source grid next to its levels
    pub write_source: bool,
}

/// Random grid generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Samples are drawn uniformly from `0..=max_value`
    pub max_value: Sample,
    /// Fixed RNG seed for reproducible grids
    pub seed: Option<u64>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "mode-pyramid".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            strategy: Strategy::Reduce,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            timestamped: true,
            write_source: true,
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_value: 4,
            seed: None,
        }
    }
}

impl PyramidConfig {
    /// Load configuration from `config/pyramid.toml` and environment
    /// variables.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// The layered provider stack, exposed for callers that want to merge
    /// further sources (the CLI flags, tests).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let level = self.application.log_level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(PyramidError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.application.log_format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(PyramidError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                VALID_FORMATS.join(", ")
            )));
        }

        if self.output.directory.as_os_str().is_empty() {
            return Err(PyramidError::Configuration(
                "output.directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = PyramidConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.strategy, Strategy::Reduce);
        assert_eq!(config.engine.workers, 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PyramidConfig::default();
        config.application.log_level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log_level 'verbose'"));

        let mut config = PyramidConfig::default();
        config.application.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = PyramidConfig::default();
        config.output.directory = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.synth, SynthConfig::default());
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pyramid.toml");
        std::fs::write(
            &path,
            "[engine]\nstrategy = \"rescan\"\n\n[synth]\nmax_value = 9\nseed = 42\n",
        )
        .unwrap();

        let config = PyramidConfig::load_from(&path).unwrap();
        assert_eq!(config.engine.strategy, Strategy::Rescan);
        assert_eq!(config.synth.max_value, 9);
        assert_eq!(config.synth.seed, Some(42));
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pyramid.toml");
        std::fs::write(&path, "[engine]\nstrategy = \"fastest\"\n").unwrap();
        assert!(matches!(
            PyramidConfig::load_from(&path),
            Err(PyramidError::Config(_))
        ));
    }
}
