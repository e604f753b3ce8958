//! # Line Parser
//!
//! Turns one RMS log line at a time into updates of a [`StatusDocument`].
//!
//! Two grammars are tried in order:
//! - **Event lines**: `2025/08/09 13:19:51-INFO-StartCapture-line:10 - Starting capture...`
//! - **Summary lines**: `camera_fov_h                    : 88.58`
//!
//! Summary lines belong to the periodic observation summary block, which
//! carries no timestamps of its own. The [`ParserContext`] remembers the
//! timestamps of the last few event lines so summary values can still be
//! dated, and keeps the small amount of state that spans lines (whether a
//! run is in progress, a pending astrometry result, the expected FITS
//! count).
//!
//! Parsing never fails: a line matching neither grammar leaves the document
//! untouched.
//!
//! ## Usage
//!
//! ```
//! use rms_telemetry::parser::{parse_line, ParserContext};
//! use rms_telemetry::status::StatusDocument;
//!
//! let mut ctx = ParserContext::new();
//! let doc = parse_line(
//!     "2025/08/09 13:20:00-INFO-DetectStarsAndMeteors-line:20 - Detected stars: 42",
//!     StatusDocument::new(),
//!     &mut ctx,
//! );
//! assert_eq!(doc.detections.unwrap().n_star, 42);
//! ```

pub mod event;
pub mod summary;

use std::collections::VecDeque;

use crate::status::timestamp::Timestamp;
use crate::status::StatusDocument;

use event::EventLine;
use summary::SummaryLine;

/// Number of recent event timestamps kept for dating summary lines
pub const LOOKBACK_CAPACITY: usize = 5;

/// Astrometry verdict waiting for the summary block that follows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAstrometry {
    /// Whether the calibration succeeded
    pub good: bool,
    /// Time of the event line that reported it
    pub at: Timestamp,
}

/// Parser state that outlives a single line.
///
/// One context exists per log stream and must only be driven from one
/// thread at a time.
#[derive(Debug, Clone, Default)]
pub struct ParserContext {
    capture_started: bool,
    pending_astrometry: Option<PendingAstrometry>,
    expected_fits: Option<i64>,
    lookback: VecDeque<Timestamp>,
}

impl ParserContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true between "Starting capture" and the following end-of-day.
    #[must_use]
    pub fn capture_started(&self) -> bool {
        self.capture_started
    }

    /// Astrometry result not yet committed to the document.
    #[must_use]
    pub fn pending_astrometry(&self) -> Option<PendingAstrometry> {
        self.pending_astrometry
    }

    /// Expected FITS count waiting for its `total_fits` partner.
    #[must_use]
    pub fn expected_fits(&self) -> Option<i64> {
        self.expected_fits
    }

    /// Most recent event timestamp, if any event line has been seen.
    #[must_use]
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.lookback.back().copied()
    }

    /// Recent event timestamps, oldest first.
    pub fn lookback(&self) -> impl Iterator<Item = &Timestamp> {
        self.lookback.iter()
    }

    fn remember(&mut self, ts: Timestamp) {
        if self.lookback.len() == LOOKBACK_CAPACITY {
            self.lookback.pop_front();
        }
        self.lookback.push_back(ts);
    }
}

/// Parse one log line into `doc`.
///
/// # Arguments
///
/// * `line` - Raw log line, with or without its trailing newline
/// * `doc` - Document to update
/// * `ctx` - Parser state carried between lines
///
/// # Returns
///
/// The updated document. All four sections are present afterwards, even
/// if the line itself was not recognised.
pub fn parse_line(line: &str, doc: StatusDocument, ctx: &mut ParserContext) -> StatusDocument {
    let mut doc = doc;
    doc.ensure_sections();

    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(event) = EventLine::parse(line) {
        event::apply(&event, line, &mut doc, ctx);
        ctx.remember(event.timestamp);
    } else if let Some(entry) = SummaryLine::parse(line) {
        summary::apply(&entry, &mut doc, ctx);
    }

    doc
}

/// Moves `field` forward to `ts`, never backwards.
fn advance(field: &mut Timestamp, ts: Timestamp) {
    if ts > *field {
        *field = ts;
    }
}
