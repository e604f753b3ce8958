//! # Host Metrics
//!
//! Memory, load, uptime, temperature and disk usage of the machine running
//! RMS, read from `/proc`, `/sys` and `df`.
//!
//! Each reading is memoised in a [`TtlCache`] keyed by the log directory so
//! that bursts of HTTP requests do not hammer the host.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use crate::cache::TtlCache;
use crate::config::CacheConfig;
use crate::error::{Result, TelemetryError};
use crate::status::timestamp::{iso8601, Timestamp};

const MEMINFO_PATH: &str = "/proc/meminfo";
const LOADAVG_PATH: &str = "/proc/loadavg";
const UPTIME_PATH: &str = "/proc/uptime";
const CPU_TEMP_PATH: &str = "/sys/class/hwmon/hwmon0/temp1_input";

/// kB -> GB
const KB_PER_GB: f64 = 1_000_000.0;

/// Memory usage in GB.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryInfo {
    pub total_gb: f64,
    pub free_gb: f64,
    pub available_gb: f64,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

/// Uptime, load averages and CPU temperature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInfo {
    pub uptime: String,
    pub load_avg_1min: f64,
    pub load_avg_5min: f64,
    pub load_avg_15min: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_temperature_c: Option<f64>,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

/// Usage of the filesystem holding the logs, in GB.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskInfo {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

/// Cached access to host metrics.
#[derive(Debug)]
pub struct SystemMonitor {
    log_dir: PathBuf,
    memory: Mutex<TtlCache<PathBuf, MemoryInfo>>,
    system: Mutex<TtlCache<PathBuf, SystemInfo>>,
    disk: Mutex<TtlCache<PathBuf, DiskInfo>>,
}

impl SystemMonitor {
    /// Creates a monitor for the filesystem holding `log_dir`.
    #[must_use]
    pub fn new(log_dir: impl Into<PathBuf>, config: &CacheConfig) -> Self {
        Self {
            log_dir: log_dir.into(),
            memory: expiring(config.max_entries, config.memory_ttl_s),
            system: expiring(config.max_entries, config.system_ttl_s),
            disk: expiring(config.max_entries, config.disk_ttl_s),
        }
    }

    /// Memory usage from `/proc/meminfo`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn memory(&self) -> Result<MemoryInfo> {
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_get_or_insert_with(self.log_dir.clone(), || {
                parse_meminfo(&std::fs::read_to_string(MEMINFO_PATH)?)
            })
    }

    /// Uptime, load and temperature.
    ///
    /// # Errors
    ///
    /// Returns error if `/proc/uptime` or `/proc/loadavg` cannot be read or
    /// parsed. A missing temperature sensor is not an error.
    pub fn system(&self) -> Result<SystemInfo> {
        self.system
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_get_or_insert_with(self.log_dir.clone(), read_system_info)
    }

    /// Disk usage of the log directory's filesystem.
    ///
    /// # Errors
    ///
    /// Returns error if `df` cannot be run or its output cannot be parsed
    pub fn disk(&self) -> Result<DiskInfo> {
        let log_dir = self.log_dir.clone();
        self.disk
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_get_or_insert_with(log_dir.clone(), || read_disk_info(&log_dir))
    }
}

fn expiring<V: Clone>(max_entries: usize, ttl_s: u64) -> Mutex<TtlCache<PathBuf, V>> {
    Mutex::new(TtlCache::new(max_entries, Duration::from_secs(ttl_s)))
}

fn read_system_info() -> Result<SystemInfo> {
    let uptime = parse_uptime(&std::fs::read_to_string(UPTIME_PATH)?)?;
    let (load_1, load_5, load_15) = parse_loadavg(&std::fs::read_to_string(LOADAVG_PATH)?)?;
    let cpu_temperature_c = match std::fs::read_to_string(CPU_TEMP_PATH) {
        Ok(raw) => parse_millidegrees(&raw),
        Err(e) => {
            debug!("No CPU temperature available: {}", e);
            None
        }
    };

    Ok(SystemInfo {
        uptime: format_uptime(uptime),
        load_avg_1min: load_1,
        load_avg_5min: load_5,
        load_avg_15min: load_15,
        cpu_temperature_c,
        updated: now(),
    })
}

fn read_disk_info(log_dir: &Path) -> Result<DiskInfo> {
    let output = Command::new("df").arg("-B1000").arg(log_dir).output()?;
    if !output.status.success() {
        return Err(TelemetryError::Metrics(format!(
            "df exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_df(&String::from_utf8_lossy(&output.stdout))
}

fn now() -> Timestamp {
    let now = Utc::now();
    chrono::DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

/// Parse `/proc/meminfo` contents.
///
/// # Errors
///
/// Returns error if any of `MemTotal`, `MemFree` or `MemAvailable` is missing
pub fn parse_meminfo(text: &str) -> Result<MemoryInfo> {
    let field = |name: &str| -> Result<f64> {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|value| value.parse::<u64>().ok())
            .map(|kb| kb as f64 / KB_PER_GB)
            .ok_or_else(|| TelemetryError::Metrics(format!("meminfo has no {}", name)))
    };

    Ok(MemoryInfo {
        total_gb: field("MemTotal:")?,
        free_gb: field("MemFree:")?,
        available_gb: field("MemAvailable:")?,
        updated: now(),
    })
}

/// Parse the three load averages from `/proc/loadavg`.
///
/// # Errors
///
/// Returns error if fewer than three numbers are present
pub fn parse_loadavg(text: &str) -> Result<(f64, f64, f64)> {
    let values: Vec<f64> = text
        .split_whitespace()
        .take(3)
        .filter_map(|v| v.parse().ok())
        .collect();
    match values.as_slice() {
        [one, five, fifteen] => Ok((*one, *five, *fifteen)),
        _ => Err(TelemetryError::Metrics(format!("unexpected loadavg: {}", text.trim()))),
    }
}

/// Whole seconds of uptime from `/proc/uptime`.
///
/// # Errors
///
/// Returns error if the first field is not a number
pub fn parse_uptime(text: &str) -> Result<u64> {
    text.split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .ok_or_else(|| TelemetryError::Metrics(format!("unexpected uptime: {}", text.trim())))
}

/// Human readable uptime: `3 days, 4:05`, `4:05`, `5 min` or `12 s`.
#[must_use]
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = seconds / 3_600 % 24;
    let minutes = seconds / 60 % 60;

    if days > 0 {
        format!("{} days, {}:{:02}", days, hours, minutes)
    } else if hours > 0 {
        format!("{}:{:02}", hours, minutes)
    } else if minutes > 0 {
        format!("{} min", minutes)
    } else {
        format!("{} s", seconds % 60)
    }
}

fn parse_millidegrees(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().map(|milli| milli / 1000.0)
}

/// Parse `df -B1000` output.
///
/// # Errors
///
/// Returns error if no data row is present
pub fn parse_df(text: &str) -> Result<DiskInfo> {
    let row = text
        .lines()
        .filter(|line| !line.starts_with("Filesystem") && line.trim().len() >= 3)
        .last()
        .ok_or_else(|| TelemetryError::Metrics("df printed no filesystem".to_string()))?;

    let numbers: Vec<u64> = row
        .split_whitespace()
        .skip(1)
        .take(3)
        .filter_map(|v| v.parse().ok())
        .collect();
    match numbers.as_slice() {
        [total, used, free] => Ok(DiskInfo {
            total_gb: *total as f64 / KB_PER_GB,
            used_gb: *used as f64 / KB_PER_GB,
            free_gb: *free as f64 / KB_PER_GB,
            updated: now(),
        }),
        _ => Err(TelemetryError::Metrics(format!("unexpected df row: {}", row))),
    }
}
