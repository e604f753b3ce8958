//! # Error Types
//!
//! Custom error types for RMS Telemetry using `thiserror`.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for RMS Telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid log file glob pattern
    #[error("Invalid log pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Malformed JSON report in a night archive
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No run has been archived yet
    #[error("No history available")]
    HistoryEmpty,

    /// History exists but holds no run started on the requested date
    #[error("No history entry for {0}")]
    HistoryNotFound(NaiveDate),

    /// Host metrics output could not be understood
    #[error("Metrics parse error: {0}")]
    Metrics(String),
}

/// Result type alias for RMS Telemetry
pub type Result<T> = std::result::Result<T, TelemetryError>;
