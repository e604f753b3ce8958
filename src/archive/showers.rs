//! # Meteor Showers
//!
//! The RMS catalogue of established showers and the `_radiants.txt` report
//! written for each night.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Serialize;

use super::iso_seconds;
use crate::error::Result;

/// Name used for meteors not associated with any shower.
pub const SPORADIC: &str = "sporadic";

/// Header line opening the per-shower count block of a radiants report.
const BREAKDOWN_HEADER: &str = "# Code, Count, IAU link";

/// One row of `established_showers.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shower {
    pub iau_no: u32,
    pub code: String,
    pub name: String,
    pub sol_begin: f64,
    pub sol_max: f64,
    pub sol_end: f64,
    pub ra: f64,
    pub delta_ra: f64,
    pub dec: f64,
    pub delta_dec: f64,
    pub vg: f64,
    pub delta_vg: f64,
    pub reference: String,
}

/// Established showers keyed by their three-letter code.
#[derive(Debug, Clone, Default)]
pub struct ShowerCatalog {
    by_code: HashMap<String, Shower>,
}

impl ShowerCatalog {
    /// Read the catalogue from `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Parse `|`-separated catalogue rows. Comments and malformed rows are
    /// skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let by_code = text
            .lines()
            .filter(|line| line.len() >= 3 && !line.starts_with('#'))
            .filter_map(parse_shower)
            .map(|shower| (shower.code.clone(), shower))
            .collect();
        Self { by_code }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Shower> {
        self.by_code.get(code)
    }

    /// Display name for a shower code from a radiants report.
    ///
    /// `...` marks sporadic meteors; unknown codes are returned unchanged.
    #[must_use]
    pub fn display_name(&self, code: &str) -> String {
        if code == "..." {
            return SPORADIC.to_string();
        }
        self.get(code)
            .map(|shower| shower.name.clone())
            .unwrap_or_else(|| code.to_string())
    }
}

fn parse_shower(line: &str) -> Option<Shower> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() < 13 {
        return None;
    }
    let number = |i: usize| fields[i].parse::<f64>().ok();

    let sol_max = number(4)?;
    // Showers without an activity window only list the maximum
    let (sol_begin, sol_end) = match (number(3), number(5)) {
        (Some(begin), Some(end)) => (begin, end),
        _ => (sol_max, sol_max),
    };

    Some(Shower {
        iau_no: fields[0].parse().ok()?,
        code: fields[1].to_string(),
        name: fields[2].to_string(),
        sol_begin,
        sol_max,
        sol_end,
        ra: number(6)?,
        delta_ra: number(7)?,
        dec: number(8)?,
        delta_dec: number(9)?,
        vg: number(10)?,
        delta_vg: number(11)?,
        reference: fields[12].to_string(),
    })
}

/// One meteor from a radiants report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadiantMeteor {
    pub date: String,
    /// Seconds since the Unix epoch, if `date` could be read
    pub timestamp: Option<f64>,
    pub start_jd: f64,
    pub sol: f64,
    pub shower: String,
    pub start_radec: (f64, f64),
    pub stop_radec: (f64, f64),
    pub mag: f64,
}

/// Meteor counts per shower from the summary block of a radiants report.
#[must_use]
pub fn parse_breakdown(text: &str, catalog: &ShowerCatalog) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    let mut in_block = false;

    for line in text.lines() {
        if line.starts_with(BREAKDOWN_HEADER) {
            in_block = true;
            continue;
        }
        if !in_block {
            continue;
        }

        let entry = line.get(1..).unwrap_or_default().trim();
        if entry.len() < 3 {
            break;
        }
        let mut parts = entry.splitn(3, ',');
        let (Some(code), Some(count)) = (parts.next(), parts.next()) else {
            continue;
        };
        if let Ok(count) = count.trim().parse::<u64>() {
            counts.insert(catalog.display_name(code.trim()), count);
        }
    }

    counts
}

/// Per-meteor rows of a radiants report. Malformed rows are skipped.
#[must_use]
pub fn parse_radiants(text: &str, catalog: &ShowerCatalog) -> Vec<RadiantMeteor> {
    text.lines()
        .filter(|line| line.len() >= 3 && !line.starts_with('#'))
        .filter_map(|line| parse_radiant(line, catalog))
        .collect()
}

fn parse_radiant(line: &str, catalog: &ShowerCatalog) -> Option<RadiantMeteor> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 11 {
        return None;
    }
    let number = |i: usize| fields[i].parse::<f64>().ok();

    // YYYYMMDD?HH:MM:SS.ffffff
    let raw = fields[0];
    let date = format!(
        "{}-{}-{}T{}",
        raw.get(0..4)?,
        raw.get(4..6)?,
        raw.get(6..8)?,
        raw.get(9..)?
    );

    Some(RadiantMeteor {
        timestamp: iso_seconds(&date),
        date,
        start_jd: number(1)?,
        sol: number(2)?,
        shower: catalog.display_name(fields[3]),
        start_radec: (number(4)?, number(5)?),
        stop_radec: (number(6)?, number(7)?),
        mag: number(fields.len() - 3)?,
    })
}
