//! # Status Document
//!
//! The telemetry snapshot built from the RMS log stream.
//!
//! A document is a tree of named sections:
//! - `capture`: whether the camera is capturing and how healthy the capture is
//! - `detections`: star and meteor counts for the current run
//! - `camera`: calibration parameters from the observation summary block
//! - `upload`: files in flight and files delivered
//! - `error` / `critical`: offending log lines since the last rollover
//!
//! A freshly created document has no sections at all. The first parsed line
//! materialises all four, and from then on they are always present.

pub mod timestamp;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use timestamp::{iso8601, sentinel, Timestamp};

/// Complete status snapshot of one station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<DetectionSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraSection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadSection>,

    /// Raw ERROR lines, deduplicated, in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error: Vec<String>,

    /// Raw CRITICAL lines, deduplicated, in arrival order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub critical: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,

    /// Time of the most recent parsed event line
    #[serde(
        default,
        with = "iso8601::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated: Option<Timestamp>,

    /// Set by the parser at the end-of-day boundary, consumed by the store.
    #[serde(skip)]
    pub end_of_day: bool,
}

/// Capture progress of the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSection {
    pub running: bool,
    pub duration_hr: f64,
    #[serde(with = "iso8601")]
    pub started: Timestamp,
    #[serde(with = "iso8601")]
    pub latest_block: Timestamp,
    pub block_max_age_s: f64,
    pub n_frames_dropped: u64,
    #[serde(with = "iso8601")]
    pub latest_all_white: Timestamp,
    #[serde(
        default,
        with = "iso8601::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_start: Option<Timestamp>,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            running: false,
            duration_hr: 0.0,
            started: sentinel(),
            latest_block: sentinel(),
            block_max_age_s: 0.0,
            n_frames_dropped: 0,
            latest_all_white: sentinel(),
            next_start: None,
            updated: sentinel(),
        }
    }
}

/// Star and meteor counts of the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSection {
    pub n_star: u64,
    pub n_meteor: u64,
    #[serde(with = "iso8601")]
    pub last_meteor: Timestamp,
    pub n_meteor_final: u64,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            n_star: 0,
            n_meteor: 0,
            last_meteor: sentinel(),
            n_meteor_final: 0,
            updated: sentinel(),
        }
    }
}

/// A camera calibration parameter as it appeared in the summary block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CameraValue {
    /// Coerces a summary value: `True`/`False`, then integer, then float,
    /// otherwise the text itself.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "True" => Self::Bool(true),
            "False" => Self::Bool(false),
            _ => {
                if let Ok(value) = raw.parse::<i64>() {
                    Self::Int(value)
                } else if let Ok(value) = raw.parse::<f64>() {
                    Self::Float(value)
                } else {
                    Self::Text(raw.to_string())
                }
            }
        }
    }

    /// Integer view of the value, accepting whole floats.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }
}

/// Camera calibration parameters plus derived quality flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSection {
    /// Free-form parameters keyed by their summary name
    #[serde(flatten)]
    pub params: BTreeMap<String, CameraValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astrometry_good: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photometry_good: Option<bool>,
    /// Percentage of the expected FITS files actually written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fits_fill: Option<f64>,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

impl CameraSection {
    /// Names of the fixed fields, which `params` must never shadow.
    pub const RESERVED_KEYS: &'static [&'static str] =
        &["astrometry_good", "photometry_good", "fits_fill", "updated"];

    /// Returns true if `name` collides with a fixed field.
    #[must_use]
    pub fn is_reserved(name: &str) -> bool {
        Self::RESERVED_KEYS.contains(&name)
    }
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            params: BTreeMap::new(),
            astrometry_good: None,
            photometry_good: None,
            fits_fill: None,
            updated: sentinel(),
        }
    }
}

/// Upload queue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSection {
    pub attempted: Vec<String>,
    pub completed: Vec<String>,
    #[serde(with = "iso8601")]
    pub updated: Timestamp,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            attempted: Vec::new(),
            completed: Vec::new(),
            updated: sentinel(),
        }
    }
}

impl StatusDocument {
    /// Creates an untouched document with no sections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true until the first line has been parsed into the document.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        self.capture.is_none()
            && self.detections.is_none()
            && self.camera.is_none()
            && self.upload.is_none()
    }

    /// Materialises every section that is still missing.
    pub fn ensure_sections(&mut self) {
        self.capture.get_or_insert_with(CaptureSection::default);
        self.detections.get_or_insert_with(DetectionSection::default);
        self.camera.get_or_insert_with(CameraSection::default);
        self.upload.get_or_insert_with(UploadSection::default);
    }

    /// Mutable access to the capture section, created on demand.
    pub fn capture_mut(&mut self) -> &mut CaptureSection {
        self.capture.get_or_insert_with(CaptureSection::default)
    }

    /// Mutable access to the detection section, created on demand.
    pub fn detections_mut(&mut self) -> &mut DetectionSection {
        self.detections.get_or_insert_with(DetectionSection::default)
    }

    /// Mutable access to the camera section, created on demand.
    pub fn camera_mut(&mut self) -> &mut CameraSection {
        self.camera.get_or_insert_with(CameraSection::default)
    }

    /// Mutable access to the upload section, created on demand.
    pub fn upload_mut(&mut self) -> &mut UploadSection {
        self.upload.get_or_insert_with(UploadSection::default)
    }

    /// Latest mutation time across the document and its sections.
    ///
    /// Falls back to the epoch sentinel for an untouched document.
    #[must_use]
    pub fn last_modified(&self) -> Timestamp {
        [
            self.updated,
            self.capture.as_ref().map(|s| s.updated),
            self.detections.as_ref().map(|s| s.updated),
            self.camera.as_ref().map(|s| s.updated),
            self.upload.as_ref().map(|s| s.updated),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or_else(sentinel)
    }

    /// Zeroes the per-run capture and detection counters.
    ///
    /// Star counts, camera parameters and uploads are left as they are.
    pub fn reset_run_counters(&mut self) {
        let capture = self.capture_mut();
        capture.duration_hr = 0.0;
        capture.started = sentinel();
        capture.latest_block = sentinel();
        capture.block_max_age_s = 0.0;
        capture.n_frames_dropped = 0;
        capture.latest_all_white = sentinel();

        let detections = self.detections_mut();
        detections.n_meteor = 0;
        detections.last_meteor = sentinel();
        detections.n_meteor_final = 0;
    }

    /// Date on which the document's capture run started, if known.
    #[must_use]
    pub fn run_date(&self) -> Option<chrono::NaiveDate> {
        self.capture
            .as_ref()
            .map(|capture| capture.started)
            .filter(|started| !timestamp::is_sentinel(started))
            .map(|started| started.date_naive())
    }
}
