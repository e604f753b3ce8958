//! # Observation Summary Lines
//!
//! `key : value` pairs from the summary block RMS writes after each night.
//! They carry no timestamp, so the camera section is dated from the most
//! recent event line seen by the parser.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{advance, ParserContext};
use crate::status::{CameraSection, CameraValue, StatusDocument};

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<key>[a-z_]+)\s*:\s?(?P<value>.*)$").expect("summary line pattern is valid")
});

/// One `key : value` line.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> SummaryLine<'a> {
    /// Match `line` against the summary grammar.
    pub fn parse(line: &'a str) -> Option<Self> {
        let caps = SUMMARY_RE.captures(line)?;
        Some(Self {
            key: caps.name("key")?.as_str(),
            value: caps.name("value")?.as_str().trim(),
        })
    }
}

/// Apply a summary line to the document.
pub(crate) fn apply(entry: &SummaryLine<'_>, doc: &mut StatusDocument, ctx: &mut ParserContext) {
    let value = CameraValue::coerce(entry.value);
    let mut touched = false;

    if let Some(name) = entry
        .key
        .strip_prefix("camera_")
        .filter(|name| !name.is_empty() && !CameraSection::is_reserved(name))
    {
        doc.camera_mut().params.insert(name.to_string(), value.clone());
        touched = true;
    }

    match entry.key {
        "jitter_quality" => {
            doc.camera_mut().params.insert(entry.key.to_string(), value);
            touched = true;
        }
        "photometry_good" => {
            let camera = doc.camera_mut();
            // Exactly one of the field and the raw param holds the value
            match value {
                CameraValue::Bool(good) => {
                    camera.photometry_good = Some(good);
                    camera.params.remove(entry.key);
                }
                other => {
                    camera.photometry_good = None;
                    camera.params.insert(entry.key.to_string(), other);
                }
            }
            if let Some(pending) = ctx.pending_astrometry.take() {
                camera.astrometry_good = Some(pending.good);
                advance(&mut camera.updated, pending.at);
            }
            touched = true;
        }
        "total_expected_fits" => {
            ctx.expected_fits = value.as_i64();
        }
        "total_fits" => {
            if let Some(expected) = ctx.expected_fits.take() {
                if let (Some(total), true) = (value.as_i64(), expected > 0) {
                    doc.camera_mut().fits_fill = Some(100.0 * total as f64 / expected as f64);
                    touched = true;
                }
            }
        }
        _ => {}
    }

    if touched {
        if let Some(ts) = ctx.latest_timestamp() {
            advance(&mut doc.camera_mut().updated, ts);
        }
    }
}
