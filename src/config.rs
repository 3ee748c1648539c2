//! Client configuration.
//!
//! Values come from three layers, highest priority first: command-line flags,
//! a JSON config file, built-in defaults. The file is optional; every field
//! in it is optional too.
//!
//! Default locations:
//! 1. `$XDG_CONFIG_HOME/archive-client/config.json`
//! 2. `$HOME/.config/archive-client/config.json`

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::DEFAULT_POLL_INTERVAL;
use crate::download::DEFAULT_MAX_CONCURRENT_DOWNLOADS;

const APP_DIR: &str = "archive-client";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    Invalid {
        field: &'static str,
        value: u64,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the server; empty leaves the client unconfigured.
    pub server_address: String,
    /// Raw API key; empty sends no `Authorization` header.
    pub api_key: String,
    /// Include raw error details in user-facing messages.
    pub verbose_errors: bool,
    pub downloads_dir: PathBuf,
    /// JSON list of extra request headers.
    pub headers_file: PathBuf,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub job_poll_interval_ms: u64,
    pub max_concurrent_downloads: usize,
    /// Filter listings against a local copy of the archive list.
    pub local_mode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            api_key: String::new(),
            verbose_errors: false,
            downloads_dir: default_data_dir().join("downloads"),
            headers_file: default_config_dir().join("headers.json"),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            job_poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(100),
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            local_mode: false,
        }
    }
}

impl ClientConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or holds
    /// an out-of-range value.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at the default location, or defaults if there is none.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) when the default file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first out-of-range field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_range(
            "connect_timeout_secs",
            self.connect_timeout_secs,
            1,
            3600,
            "1..=3600",
        )?;
        validate_range(
            "read_timeout_secs",
            self.read_timeout_secs,
            1,
            3600,
            "1..=3600",
        )?;
        validate_range(
            "job_poll_interval_ms",
            self.job_poll_interval_ms,
            10,
            60_000,
            "10..=60000",
        )?;
        validate_range(
            "max_concurrent_downloads",
            self.max_concurrent_downloads as u64,
            1,
            16,
            "1..=16",
        )
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    #[must_use]
    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }
}

fn validate_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value,
            expected,
        })
    }
}

/// Resolves the default config file path, if a base directory is known.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_base().map(|base| base.join(APP_DIR).join("config.json"))
}

fn config_base() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }
    env_var_non_empty_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

fn data_base() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg));
    }
    env_var_non_empty_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
}

fn default_config_dir() -> PathBuf {
    config_base().map_or_else(|| PathBuf::from("."), |base| base.join(APP_DIR))
}

fn default_data_dir() -> PathBuf {
    data_base().map_or_else(|| PathBuf::from("."), |base| base.join(APP_DIR))
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
