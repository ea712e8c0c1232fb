//! Layered configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, and `OBDWATCH_*` environment variables. Nested keys
//! use a double underscore, e.g. `OBDWATCH_DEVICE__ADDRESS`.
//!
//! ```toml
//! stop_timeout = "5s"
//! log_directory = "/var/log/obd"
//!
//! [device]
//! address = "192.168.0.10:35000"
//! connect_timeout = "3s"
//!
//! [replay]
//! interval = "100ms"
//! default_log = "trace.log"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration::deserialize_duration;

const ENV_PREFIX: &str = "OBDWATCH";

/// Live device settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// `host:port` of the adapter.
    pub address: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub connect_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "192.168.0.10:35000".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Simulation log settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Pause between replayed records.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    /// Log opened by path-taking commands issued without a path.
    pub default_log: Option<PathBuf>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            default_log: None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub device: DeviceConfig,
    pub replay: ReplayConfig,
    /// How long a stopping worker may take before it is aborted.
    #[serde(deserialize_with = "deserialize_duration")]
    pub stop_timeout: Duration,
    /// Upper bound for a connection test.
    #[serde(deserialize_with = "deserialize_duration")]
    pub test_timeout: Duration,
    /// Where relative log paths are looked up.
    pub log_directory: Option<PathBuf>,
    /// Start monitoring on launch.
    pub auto_start: bool,
    /// Default tracing filter; `RUST_LOG` takes precedence.
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            replay: ReplayConfig::default(),
            stop_timeout: Duration::from_secs(5),
            test_timeout: Duration::from_secs(5),
            log_directory: None,
            auto_start: false,
            log_level: "info".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from `path` (if given) and the environment.
    ///
    /// A path that was given explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }
}
