//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for a standard RMS installation.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TelemetryError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// HTTP query surface configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Log watching configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LogsConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_pattern")]
    pub pattern: String,

    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,

    #[serde(default = "default_shutdown_slice_ms")]
    pub shutdown_slice_ms: u64,

    #[serde(default = "default_bootstrap_max_files")]
    pub bootstrap_max_files: usize,
}

/// Archived run configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

/// Host metrics and archive cache configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_disk_ttl_s")]
    pub disk_ttl_s: u64,

    #[serde(default = "default_memory_ttl_s")]
    pub memory_ttl_s: u64,

    #[serde(default = "default_system_ttl_s")]
    pub system_ttl_s: u64,

    #[serde(default = "default_archive_ttl_s")]
    pub archive_ttl_s: u64,
}

/// Nightly archive configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default = "default_showers_csv")]
    pub showers_csv: PathBuf,
}

// Default value functions
fn default_ip() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }

fn default_log_dir() -> PathBuf { PathBuf::from("/home/rms/RMS_data/logs") }
fn default_pattern() -> String { "log_*.log".to_string() }
fn default_poll_interval_s() -> u64 { 120 }
fn default_shutdown_slice_ms() -> u64 { 1000 }
fn default_bootstrap_max_files() -> usize { 7 }

fn default_max_history() -> usize { 7 }

fn default_max_entries() -> usize { 8 }
fn default_disk_ttl_s() -> u64 { 300 }
fn default_memory_ttl_s() -> u64 { 60 }
fn default_system_ttl_s() -> u64 { 60 }
fn default_archive_ttl_s() -> u64 { 3600 }

fn default_showers_csv() -> PathBuf { PathBuf::from("/home/rms/source/RMS/share/established_showers.csv") }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            pattern: default_pattern(),
            poll_interval_s: default_poll_interval_s(),
            shutdown_slice_ms: default_shutdown_slice_ms(),
            bootstrap_max_files: default_bootstrap_max_files(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            disk_ttl_s: default_disk_ttl_s(),
            memory_ttl_s: default_memory_ttl_s(),
            system_ttl_s: default_system_ttl_s(),
            archive_ttl_s: default_archive_ttl_s(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            showers_csv: default_showers_csv(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rms_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.server.ip.is_empty() {
            return Err(invalid("server ip cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(invalid("server port must be greater than 0"));
        }

        if self.logs.log_dir.as_os_str().is_empty() {
            return Err(invalid("log_dir cannot be empty"));
        }

        if self.logs.pattern.is_empty() {
            return Err(invalid("log pattern cannot be empty"));
        }

        if let Err(e) = glob::Pattern::new(&self.logs.pattern) {
            return Err(invalid(format!("log pattern is not a valid glob: {}", e)));
        }

        if self.logs.poll_interval_s == 0 || self.logs.poll_interval_s > 3600 {
            return Err(invalid("poll_interval_s must be between 1 and 3600"));
        }

        // Shutdown must be noticed within about a second
        if self.logs.shutdown_slice_ms == 0 || self.logs.shutdown_slice_ms > 1000 {
            return Err(invalid("shutdown_slice_ms must be between 1 and 1000"));
        }

        if self.logs.bootstrap_max_files == 0 {
            return Err(invalid("bootstrap_max_files must be greater than 0"));
        }

        if self.history.max_history == 0 {
            return Err(invalid("max_history must be greater than 0"));
        }

        if self.cache.max_entries == 0 {
            return Err(invalid("cache max_entries must be greater than 0"));
        }

        for (name, value) in [
            ("disk_ttl_s", self.cache.disk_ttl_s),
            ("memory_ttl_s", self.cache.memory_ttl_s),
            ("system_ttl_s", self.cache.system_ttl_s),
            ("archive_ttl_s", self.cache.archive_ttl_s),
        ] {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        Ok(())
    }
}
