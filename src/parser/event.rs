//! # Event Lines
//!
//! Timestamped log records of the form
//! `DATE TIME-LEVEL-MODULE-line:N - MESSAGE`, dispatched on the emitting
//! RMS module and then on the message text.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{advance, ParserContext, PendingAstrometry};
use crate::status::timestamp::{sentinel, Timestamp};
use crate::status::StatusDocument;

static EVENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<date>\d{4}[/-]\d{2}[/-]\d{2}) (?P<time>\d{2}:\d{2}:\d{2})-(?P<level>[A-Z]+)-(?P<module>\S+?)-line:(?P<line>\d+) - (?P<message>.*)$",
    )
    .expect("event line pattern is valid")
});

static NEXT_CAPTURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Next Capture start\s*:\s*(?P<h>\d{1,2}):(?P<m>\d{2}):(?P<s>\d{2})")
        .expect("next capture pattern is valid")
});

/// Layouts accepted for the absolute time in "Next start time:" messages
const NEXT_START_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// One recognised event line.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLine<'a> {
    pub timestamp: Timestamp,
    pub level: &'a str,
    pub module: &'a str,
    pub line_number: u64,
    pub message: &'a str,
}

impl<'a> EventLine<'a> {
    /// Match `line` against the event grammar.
    ///
    /// Returns `None` if the shape does not match or the date is not a real
    /// calendar date.
    pub fn parse(line: &'a str) -> Option<Self> {
        let caps = EVENT_RE.captures(line)?;
        let date = caps.name("date")?.as_str().replace('/', "-");
        let time = caps.name("time")?.as_str();
        let timestamp = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S")
            .ok()?
            .and_utc();

        Some(Self {
            timestamp,
            level: caps.name("level")?.as_str(),
            module: caps.name("module")?.as_str(),
            line_number: caps.name("line")?.as_str().parse().ok()?,
            message: caps.name("message")?.as_str(),
        })
    }
}

/// Apply an event line to the document.
///
/// `raw` is the full line, recorded verbatim for ERROR and CRITICAL levels.
pub(crate) fn apply(
    event: &EventLine<'_>,
    raw: &str,
    doc: &mut StatusDocument,
    ctx: &mut ParserContext,
) {
    doc.updated = Some(event.timestamp);

    match event.module {
        "StartCapture" => start_capture(event, doc, ctx),
        "EventMonitor" => event_monitor(event, doc),
        "BufferedCapture" => buffered_capture(event, doc),
        "VideoExtraction" => {
            if event.message.contains("frames are all white") {
                let capture = doc.capture_mut();
                advance(&mut capture.latest_all_white, event.timestamp);
                advance(&mut capture.updated, event.timestamp);
            }
        }
        "DetectStarsAndMeteors" => detections(event, doc),
        "MLFilter" => ml_filter(event, doc),
        "Reprocess" => reprocess(event, ctx),
        "UploadManager" => upload(event, doc),
        _ => {}
    }

    match event.level {
        "ERROR" => push_unique(&mut doc.error, raw.trim()),
        "CRITICAL" => push_unique(&mut doc.critical, raw.trim()),
        _ => {}
    }
}

fn start_capture(event: &EventLine<'_>, doc: &mut StatusDocument, ctx: &mut ParserContext) {
    let ts = event.timestamp;
    let message = event.message;

    if message.starts_with("Starting capture") {
        ctx.capture_started = true;

        let capture = doc.capture_mut();
        capture.running = true;
        capture.duration_hr = trailing_number(message).unwrap_or(0.0);
        capture.started = ts;
        capture.latest_block = sentinel();
        capture.latest_all_white = sentinel();
        capture.block_max_age_s = 0.0;
        capture.n_frames_dropped = 0;
        capture.next_start = None;
        advance(&mut capture.updated, ts);

        let detections = doc.detections_mut();
        detections.n_meteor = 0;
        detections.last_meteor = sentinel();
        detections.n_meteor_final = 0;
        advance(&mut detections.updated, ts);
    } else if message.starts_with("Ending capture") {
        let capture = doc.capture_mut();
        capture.running = false;
        advance(&mut capture.updated, ts);
    } else if let Some(rest) = message.strip_prefix("Next start time:") {
        if ctx.capture_started {
            // End of the night: the store archives and resets
            doc.end_of_day = true;
            ctx.capture_started = false;
        } else if let Some(next) = parse_next_start(rest) {
            let capture = doc.capture_mut();
            capture.next_start = Some(next);
            advance(&mut capture.updated, ts);
        }
    }
}

fn event_monitor(event: &EventLine<'_>, doc: &mut StatusDocument) {
    let Some(caps) = NEXT_CAPTURE_RE.captures(event.message) else {
        return;
    };
    let field = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
    let (Some(h), Some(m), Some(s)) = (field("h"), field("m"), field("s")) else {
        return;
    };
    let Some(time) = NaiveTime::from_hms_opt(h, m, s) else {
        return;
    };

    // Only the time of day is logged; it refers to the next occurrence
    let mut next = event.timestamp.date_naive().and_time(time).and_utc();
    if next <= event.timestamp {
        next += Duration::days(1);
    }

    let capture = doc.capture_mut();
    capture.next_start = Some(next);
    advance(&mut capture.updated, event.timestamp);
}

fn buffered_capture(event: &EventLine<'_>, doc: &mut StatusDocument) {
    let Some(rest) = event.message.strip_prefix("Block's max frame age:") else {
        return;
    };
    let Some((age, dropped)) = rest.split_once(':') else {
        return;
    };
    let age = age.split_whitespace().next().and_then(|v| v.parse::<f64>().ok());
    let dropped = dropped.split_whitespace().next().and_then(|v| v.parse::<u64>().ok());
    let (Some(age), Some(dropped)) = (age, dropped) else {
        return;
    };

    let capture = doc.capture_mut();
    advance(&mut capture.latest_block, event.timestamp);
    capture.block_max_age_s = age;
    capture.n_frames_dropped = dropped;
    advance(&mut capture.updated, event.timestamp);
}

fn detections(event: &EventLine<'_>, doc: &mut StatusDocument) {
    let message = event.message;
    let ts = event.timestamp;

    if let Some(rest) = message.strip_prefix("Detected stars:") {
        if let Some(n_star) = first_integer(rest) {
            let detections = doc.detections_mut();
            detections.n_star = n_star;
            advance(&mut detections.updated, ts);
        }
    } else if message.contains("detected meteors:") {
        let Some(n_meteor) = message.rsplit_once(':').and_then(|(_, n)| first_integer(n)) else {
            return;
        };
        let detections = doc.detections_mut();
        detections.n_meteor = detections.n_meteor.saturating_add(n_meteor);
        if n_meteor > 0 {
            advance(&mut detections.last_meteor, ts);
        }
        advance(&mut detections.updated, ts);
    }
}

fn ml_filter(event: &EventLine<'_>, doc: &mut StatusDocument) {
    let Some(rest) = event.message.strip_prefix("FTPdetectinfo filtered,") else {
        return;
    };
    let Some(n_final) = rest
        .split_once('/')
        .and_then(|(kept, _)| kept.split_whitespace().last())
        .and_then(|n| n.parse::<u64>().ok())
    else {
        return;
    };

    let detections = doc.detections_mut();
    detections.n_meteor_final = n_final;
    advance(&mut detections.updated, event.timestamp);
}

fn reprocess(event: &EventLine<'_>, ctx: &mut ParserContext) {
    if !event.message.starts_with("Astrometric calibration") {
        return;
    }
    let good = if event.message.contains("SUCCESSFUL") {
        true
    } else if event.message.contains("FAILED") {
        false
    } else {
        return;
    };

    // Committed once the summary block reports photometry
    ctx.pending_astrometry = Some(PendingAstrometry {
        good,
        at: event.timestamp,
    });
}

fn upload(event: &EventLine<'_>, doc: &mut StatusDocument) {
    let message = event.message;

    if let Some(path) = message.strip_prefix("Starting upload of") {
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        let name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());

        let upload = doc.upload_mut();
        // A retry moves to the back of the queue
        upload.attempted.retain(|entry| *entry != name);
        upload.attempted.push(name);
        advance(&mut upload.updated, event.timestamp);
    } else if message.starts_with("Upload successful") {
        let upload = doc.upload_mut();
        if let Some(name) = upload.attempted.pop() {
            upload.completed.push(name);
            advance(&mut upload.updated, event.timestamp);
        }
    }
}

fn push_unique(lines: &mut Vec<String>, line: &str) {
    if !lines.iter().any(|existing| existing == line) {
        lines.push(line.to_string());
    }
}

/// Last whitespace-separated token of `message` that parses as a number.
fn trailing_number(message: &str) -> Option<f64> {
    message
        .split_whitespace()
        .rev()
        .find_map(|token| token.parse::<f64>().ok())
}

fn first_integer(text: &str) -> Option<u64> {
    text.split_whitespace().next().and_then(|n| n.parse().ok())
}

fn parse_next_start(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    let text = text.strip_suffix("UTC").unwrap_or(text).trim();

    NEXT_START_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .and_then(|naive| naive.with_nanosecond(0))
        .map(|naive| naive.and_utc())
}
