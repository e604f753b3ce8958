//! # Meteor Detections
//!
//! Per-meteor rows of the night's `.csv` report, tagged with the shower
//! they belong to when the radiants report lists them.

use serde::Serialize;

use super::iso_seconds;
use super::showers::RadiantMeteor;

/// Shower name for meteors missing from the radiants report.
pub const UNKNOWN_SHOWER: &str = "unknown";

/// Two reports describe the same meteor if their times differ by less than this.
const MATCH_WINDOW_S: f64 = 0.25;

/// One detected meteor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeteorDetail {
    pub date: String,
    /// Seconds since the Unix epoch, if `date` could be read
    pub timestamp: Option<f64>,
    pub mag: f64,
    pub dur: f64,
    pub start_azalt: (f64, f64),
    pub stop_azalt: (f64, f64),
    pub start_radec: (f64, f64),
    pub stop_radec: (f64, f64),
    pub shower: String,
}

/// Parse the `.csv` report, matching meteors against `radiants`.
///
/// The header row and malformed rows are skipped.
#[must_use]
pub fn parse_meteors(text: &str, radiants: &[RadiantMeteor]) -> Vec<MeteorDetail> {
    text.lines()
        .filter(|line| line.len() >= 3 && !line.starts_with("Ver,Y,M,D"))
        .filter_map(parse_meteor)
        .map(|mut meteor| {
            if let Some(radiant) = radiants.iter().find(|radiant| same_meteor(radiant, &meteor)) {
                meteor.shower = radiant.shower.clone();
            }
            meteor
        })
        .collect()
}

fn same_meteor(radiant: &RadiantMeteor, meteor: &MeteorDetail) -> bool {
    match (radiant.timestamp, meteor.timestamp) {
        (Some(a), Some(b)) => (a - b).abs() < MATCH_WINDOW_S && radiant.mag == meteor.mag,
        _ => false,
    }
}

fn parse_meteor(line: &str) -> Option<MeteorDetail> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 17 {
        return None;
    }
    let int = |i: usize| fields[i].parse::<u32>().ok();
    let number = |i: usize| fields[i].parse::<f64>().ok();

    let date = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:09.6}",
        int(1)?,
        int(2)?,
        int(3)?,
        int(4)?,
        int(5)?,
        number(6)?
    );

    Some(MeteorDetail {
        timestamp: iso_seconds(&date),
        date,
        mag: number(7)?,
        dur: number(8)?,
        start_azalt: (number(9)?, number(10)?),
        stop_azalt: (number(11)?, number(12)?),
        start_radec: (number(13)?, number(14)?),
        stop_radec: (number(15)?, number(16)?),
        shower: UNKNOWN_SHOWER.to_string(),
    })
}
