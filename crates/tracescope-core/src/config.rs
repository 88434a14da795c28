//! Configuration loading and typed config structures for Tracescope.
//!
//! The canonical configuration lives in `tracescope-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and parses the file.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TraceConfig {
    /// Sliding-window settings.
    #[serde(default)]
    pub window: WindowConfig,

    /// Field-name validation settings.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Engine driver simulation parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TraceConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Sliding-window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WindowConfig {
    /// Maximum number of retained timesteps. `0` keeps everything.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
        }
    }
}

/// How the store treats raw field names that the first retained timestep lacks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldPolicy {
    /// Reject raw names missing from the first retained timestep with an error.
    #[default]
    Strict,
    /// Accept them silently. Such fields are invisible to `get_data_size`
    /// and `get_data_names`.
    Permissive,
}

impl FieldPolicy {
    /// Return whether key-set violations are rejected.
    pub const fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}

/// Field-name validation configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct FieldsConfig {
    /// Key-set policy applied to recorded fields.
    #[serde(default)]
    pub policy: FieldPolicy,
}

/// Parameters of the engine driver's synthetic simulation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Number of ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Simulated seconds per tick.
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Real-time milliseconds between ticks. `0` runs flat out.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Random seed for reproducible sensor noise.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Amplitude of the uniform noise added to recorded positions.
    #[serde(default = "default_noise")]
    pub noise: f64,

    /// Spring stiffness of the oscillator.
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,

    /// Linear damping coefficient of the oscillator.
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Log a progress line every N ticks. `0` disables progress lines.
    #[serde(default = "default_report_every")]
    pub report_every: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            dt: default_dt(),
            tick_interval_ms: default_tick_interval_ms(),
            seed: default_seed(),
            noise: default_noise(),
            stiffness: default_stiffness(),
            damping: default_damping(),
            report_every: default_report_every(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_max_size() -> usize {
    500
}

const fn default_ticks() -> u64 {
    1000
}

const fn default_dt() -> f64 {
    0.01
}

const fn default_tick_interval_ms() -> u64 {
    0
}

const fn default_seed() -> u64 {
    42
}

const fn default_noise() -> f64 {
    0.001
}

const fn default_stiffness() -> f64 {
    4.0
}

const fn default_damping() -> f64 {
    0.1
}

const fn default_report_every() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_owned()
}
