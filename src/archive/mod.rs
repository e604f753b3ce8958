//! # Night Archives
//!
//! RMS moves each finished night into `ArchivedFiles/` next to the log
//! directory. This module finds those directories and reads the reports in
//! them: the shower breakdown, per-meteor details, the observation summary,
//! flux time intervals and the FITS listing.
//!
//! Every lookup scans the disk, so [`ArchiveReader`] memoises results in a
//! [`TtlCache`] keyed by the requested night.

pub mod meteors;
pub mod showers;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::config::{ArchiveConfig, CacheConfig};
use crate::error::Result;

pub use meteors::MeteorDetail;
pub use showers::{RadiantMeteor, ShowerCatalog};

/// Directory holding the nightly archives, relative to the log directory.
pub const ARCHIVE_DIR_NAME: &str = "ArchivedFiles";

const FITS_PATTERN: &str = "FF_*.fits";
const FLUX_INTERVALS_FILE: &str = "flux_time_intervals.json";

/// Seconds since the epoch for `YYYY-MM-DDTHH:MM:SS[.f]`.
pub(crate) fn iso_seconds(value: &str) -> Option<f64> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_micros() as f64 / 1e6)
}

/// The archive directory for `date`, or the most recent one.
///
/// # Arguments
///
/// * `log_dir` - Directory holding the RMS logs
/// * `date` - Night to look for; matched against the directory name
///
/// # Returns
///
/// * `Result<Option<PathBuf>>` - The most recently modified matching
///   directory, or `None` if there is none
///
/// # Errors
///
/// Returns error if the archive root exists but cannot be listed
pub fn archive_dir(log_dir: &Path, date: Option<NaiveDate>) -> Result<Option<PathBuf>> {
    let root = log_dir.join("..").join(ARCHIVE_DIR_NAME);
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let wanted = date.map(|date| date.format("%Y%m%d").to_string());

    let newest = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| match &wanted {
            Some(wanted) => entry.file_name().to_string_lossy().contains(wanted.as_str()),
            None => true,
        })
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_dir() {
                return None;
            }
            Some((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path);

    Ok(newest)
}

/// `dir/<dir name><suffix>`, the naming RMS uses for per-night reports.
fn report_path(dir: &Path, suffix: &str) -> Option<PathBuf> {
    let name = dir.file_name()?.to_string_lossy();
    Some(dir.join(format!("{}{}", name, suffix)))
}

/// Contents of `path`, or `None` if it does not exist.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_json(path: &Path) -> Result<Option<serde_json::Value>> {
    match read_optional(path)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// FITS files of an archive, sorted by name. `None` if there are none.
///
/// # Errors
///
/// Returns error if the directory name cannot be used as a glob
pub fn fits_listing(dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        FITS_PATTERN
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    files.sort();
    Ok(if files.is_empty() { None } else { Some(files) })
}

/// Capture time encoded in `FF_<station>_<YYYYMMDD>_<HHMMSS>_<ms>_...fits`.
#[must_use]
pub fn fits_time(path: &Path) -> Option<f64> {
    let name = path.file_name()?.to_str()?;
    let mut parts = name.splitn(6, '_');
    parts.next()?;
    parts.next()?;
    let date = parts.next()?;
    let time = parts.next()?;
    let ms = parts.next()?;
    parts.next()?;

    iso_seconds(&format!(
        "{}-{}-{}T{}:{}:{}.{}",
        date.get(0..4)?,
        date.get(4..6)?,
        date.get(6..8)?,
        time.get(0..2)?,
        time.get(2..4)?,
        time.get(4..6)?,
        ms
    ))
}

/// The last FITS file of a sorted `listing` started at or before `meteor_time`.
#[must_use]
pub fn meteor_fits_file(listing: &[PathBuf], meteor_time: f64) -> Option<PathBuf> {
    let mut found = None;
    for path in listing {
        match fits_time(path) {
            Some(start) if start <= meteor_time => found = Some(path.clone()),
            Some(_) => break,
            None => {}
        }
    }
    found
}

type NightCache<V> = Mutex<TtlCache<Option<NaiveDate>, Option<V>>>;

fn night_cache<V: Clone>(cache: &CacheConfig) -> NightCache<V> {
    Mutex::new(TtlCache::new(
        cache.max_entries,
        Duration::from_secs(cache.archive_ttl_s),
    ))
}

/// Cached readers for the nightly archives.
#[derive(Debug)]
pub struct ArchiveReader {
    log_dir: PathBuf,
    catalog: ShowerCatalog,
    dirs: NightCache<PathBuf>,
    breakdowns: NightCache<BTreeMap<String, u64>>,
    radiants: NightCache<Vec<RadiantMeteor>>,
    meteors: NightCache<Vec<MeteorDetail>>,
    summaries: NightCache<serde_json::Value>,
    flux: NightCache<serde_json::Value>,
    fits: NightCache<Vec<PathBuf>>,
}

impl ArchiveReader {
    /// Creates a reader for the archives next to `log_dir`.
    ///
    /// A missing shower catalogue leaves every shower reported by its code.
    pub fn new(log_dir: impl Into<PathBuf>, archive: &ArchiveConfig, cache: &CacheConfig) -> Self {
        let catalog = match ShowerCatalog::load(&archive.showers_csv) {
            Ok(catalog) => {
                info!(
                    "Loaded {} established showers from {}",
                    catalog.len(),
                    archive.showers_csv.display()
                );
                catalog
            }
            Err(e) => {
                debug!("No shower catalogue at {}: {}", archive.showers_csv.display(), e);
                ShowerCatalog::default()
            }
        };
        Self::with_catalog(log_dir, catalog, cache)
    }

    /// Creates a reader using an already loaded catalogue.
    pub fn with_catalog(log_dir: impl Into<PathBuf>, catalog: ShowerCatalog, cache: &CacheConfig) -> Self {
        Self {
            log_dir: log_dir.into(),
            catalog,
            dirs: night_cache(cache),
            breakdowns: night_cache(cache),
            radiants: night_cache(cache),
            meteors: night_cache(cache),
            summaries: night_cache(cache),
            flux: night_cache(cache),
            fits: night_cache(cache),
        }
    }

    fn cached<V, F>(&self, cache: &NightCache<V>, date: Option<NaiveDate>, read: F) -> Result<Option<V>>
    where
        V: Clone,
        F: FnOnce(&Path) -> Result<Option<V>>,
    {
        cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_get_or_insert_with(date, || match self.archive_dir(date)? {
                Some(dir) => read(&dir),
                None => Ok(None),
            })
    }

    /// Archive directory of `date`, or the most recent one.
    ///
    /// # Errors
    ///
    /// Returns error if the archive root cannot be listed
    pub fn archive_dir(&self, date: Option<NaiveDate>) -> Result<Option<PathBuf>> {
        self.dirs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_get_or_insert_with(date, || archive_dir(&self.log_dir, date))
    }

    /// Meteor counts per shower name.
    ///
    /// # Errors
    ///
    /// Returns error if the radiants report exists but cannot be read
    pub fn shower_breakdown(&self, date: Option<NaiveDate>) -> Result<Option<BTreeMap<String, u64>>> {
        self.cached(&self.breakdowns, date, |dir| {
            let Some(path) = report_path(dir, "_radiants.txt") else {
                return Ok(None);
            };
            Ok(read_optional(&path)?.map(|text| showers::parse_breakdown(&text, &self.catalog)))
        })
    }

    /// Per-meteor rows of the radiants report.
    ///
    /// # Errors
    ///
    /// Returns error if the radiants report exists but cannot be read
    pub fn shower_details(&self, date: Option<NaiveDate>) -> Result<Option<Vec<RadiantMeteor>>> {
        self.cached(&self.radiants, date, |dir| {
            let Some(path) = report_path(dir, "_radiants.txt") else {
                return Ok(None);
            };
            Ok(read_optional(&path)?.map(|text| showers::parse_radiants(&text, &self.catalog)))
        })
    }

    /// Detected meteors with their shower.
    ///
    /// # Errors
    ///
    /// Returns error if the meteor or radiants report cannot be read
    pub fn meteor_details(&self, date: Option<NaiveDate>) -> Result<Option<Vec<MeteorDetail>>> {
        self.cached(&self.meteors, date, |dir| {
            let Some(path) = report_path(dir, ".csv") else {
                return Ok(None);
            };
            let Some(text) = read_optional(&path)? else {
                return Ok(None);
            };
            let radiants = self.shower_details(date)?.unwrap_or_default();
            Ok(Some(meteors::parse_meteors(&text, &radiants)))
        })
    }

    /// The `_observation_summary.json` report.
    ///
    /// # Errors
    ///
    /// Returns error if the report exists but is not valid JSON
    pub fn observation_summary(&self, date: Option<NaiveDate>) -> Result<Option<serde_json::Value>> {
        self.cached(&self.summaries, date, |dir| match report_path(dir, "_observation_summary.json") {
            Some(path) => read_json(&path),
            None => Ok(None),
        })
    }

    /// The `flux_time_intervals.json` report.
    ///
    /// # Errors
    ///
    /// Returns error if the report exists but is not valid JSON
    pub fn flux_time_intervals(&self, date: Option<NaiveDate>) -> Result<Option<serde_json::Value>> {
        self.cached(&self.flux, date, |dir| read_json(&dir.join(FLUX_INTERVALS_FILE)))
    }

    /// FITS files of the night, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns error if the archive directory cannot be globbed
    pub fn fits_listing(&self, date: Option<NaiveDate>) -> Result<Option<Vec<PathBuf>>> {
        self.cached(&self.fits, date, fits_listing)
    }

    /// The FITS file holding a meteor seen at `meteor_time` (`YYYY-MM-DDTHH:MM:SS[.f]`).
    ///
    /// # Errors
    ///
    /// Returns error if the night's FITS listing cannot be read
    pub fn meteor_fits_file(&self, meteor_time: &str) -> Result<Option<PathBuf>> {
        let Some(seconds) = iso_seconds(meteor_time) else {
            return Ok(None);
        };
        let date = meteor_time
            .get(0..10)
            .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok());
        if date.is_none() {
            return Ok(None);
        }

        Ok(self
            .fits_listing(date)?
            .and_then(|listing| meteor_fits_file(&listing, seconds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    struct Station {
        _root: TempDir,
        log_dir: PathBuf,
        archive: PathBuf,
    }

    fn station() -> Station {
        let root = TempDir::new().unwrap();
        let log_dir = root.path().join("logs");
        let archive = root.path().join(ARCHIVE_DIR_NAME);
        fs::create_dir_all(&log_dir).unwrap();
        fs::create_dir_all(&archive).unwrap();
        Station {
            _root: root,
            log_dir,
            archive,
        }
    }

    fn night(station: &Station, name: &str, seconds_ago: u64) -> PathBuf {
        let dir = station.archive.join(name);
        fs::create_dir_all(&dir).unwrap();
        let handle = OpenOptions::new().read(true).open(&dir).unwrap();
        handle
            .set_modified(SystemTime::now() - Duration::from_secs(seconds_ago))
            .unwrap();
        dir
    }

    fn reader(station: &Station) -> ArchiveReader {
        let catalog = ShowerCatalog::parse(
            "7|PER|Perseids|120.0|140.0|145.0|48.0|1.4|58.0|0.26|59.1|0.0|GMN\n",
        );
        ArchiveReader::with_catalog(&station.log_dir, catalog, &CacheConfig::default())
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_archive_dir_without_archive_root() {
        let root = TempDir::new().unwrap();
        let log_dir = root.path().join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        assert_eq!(archive_dir(&log_dir, None).unwrap(), None);
    }

    #[test]
    fn test_archive_dir_newest_and_by_date() {
        let station = station();
        let older = night(&station, "US0001_20250811_013000_000000", 200);
        let newer = night(&station, "US0001_20250812_013000_000000", 100);
        fs::write(station.archive.join("US0001_20250813.tar.bz2"), "").unwrap();

        assert_eq!(archive_dir(&station.log_dir, None).unwrap(), Some(newer));
        assert_eq!(archive_dir(&station.log_dir, Some(date(11))).unwrap(), Some(older));
        assert_eq!(archive_dir(&station.log_dir, Some(date(13))).unwrap(), None);
    }

    #[test]
    fn test_reports_of_a_night() {
        let station = station();
        let dir = night(&station, "US0001_20250812_013000_000000", 10);
        fs::write(
            dir.join("US0001_20250812_013000_000000_radiants.txt"),
            "20250812 01:02:03.500000, 2460899.54, 139.5, PER, 47.1, 57.9, 48.3, 55.1, 59.0, -1.5, 0.5, 60.0\n\
             # Code, Count, IAU link\n\
             #  PER,  1, link\n\
             #\n",
        )
        .unwrap();
        fs::write(
            dir.join("US0001_20250812_013000_000000.csv"),
            "Ver,Y,M,D,h,m,s,Mag,Dur,Az1,Alt1,Az2,Alt2,RA1,Dec1,RA2,Dec2\n\
             1.0,2025,8,12,1,2,3.5,-1.5,0.5,10.0,40.0,12.0,35.0,47.1,57.9,48.3,55.1\n",
        )
        .unwrap();
        fs::write(
            dir.join("US0001_20250812_013000_000000_observation_summary.json"),
            r#"{"camera_fov_h": 88.58, "total_fits": 300}"#,
        )
        .unwrap();
        fs::write(dir.join(FLUX_INTERVALS_FILE), "[[1, 2]]").unwrap();

        let reader = reader(&station);
        let breakdown = reader.shower_breakdown(None).unwrap().unwrap();
        assert_eq!(breakdown["Perseids"], 1);

        let meteors = reader.meteor_details(Some(date(12))).unwrap().unwrap();
        assert_eq!(meteors.len(), 1);
        assert_eq!(meteors[0].shower, "Perseids");

        let summary = reader.observation_summary(None).unwrap().unwrap();
        assert_eq!(summary["total_fits"], 300);

        assert_eq!(
            reader.flux_time_intervals(None).unwrap(),
            Some(serde_json::json!([[1, 2]]))
        );
    }

    #[test]
    fn test_missing_reports_are_none() {
        let station = station();
        night(&station, "US0001_20250812_013000_000000", 10);
        let reader = reader(&station);

        assert_eq!(reader.shower_breakdown(None).unwrap(), None);
        assert_eq!(reader.meteor_details(None).unwrap(), None);
        assert_eq!(reader.observation_summary(None).unwrap(), None);
        assert_eq!(reader.fits_listing(None).unwrap(), None);
        assert_eq!(reader.shower_breakdown(Some(date(1))).unwrap(), None);
    }

    #[test]
    fn test_invalid_summary_json_is_an_error() {
        let station = station();
        let dir = night(&station, "US0001_20250812_013000_000000", 10);
        fs::write(
            dir.join("US0001_20250812_013000_000000_observation_summary.json"),
            "{ not json",
        )
        .unwrap();

        assert!(reader(&station).observation_summary(None).is_err());
    }

    #[test]
    fn test_lookups_are_cached() {
        let station = station();
        let first = night(&station, "US0001_20250811_013000_000000", 200);
        let reader = reader(&station);
        assert_eq!(reader.archive_dir(None).unwrap(), Some(first.clone()));

        // A newer night is not seen until the cache expires
        night(&station, "US0001_20250812_013000_000000", 0);
        assert_eq!(reader.archive_dir(None).unwrap(), Some(first));
    }

    #[test]
    fn test_fits_listing_and_meteor_lookup() {
        let station = station();
        let dir = night(&station, "US0001_20250812_013000_000000", 10);
        for name in [
            "FF_US0001_20250812_010155_123_0001280.fits",
            "FF_US0001_20250812_010205_340_0001536.fits",
            "FF_US0001_20250812_010215_560_0001792.fits",
        ] {
            fs::write(dir.join(name), "").unwrap();
        }
        fs::write(dir.join("notes.txt"), "").unwrap();

        let reader = reader(&station);
        let listing = reader.fits_listing(Some(date(12))).unwrap().unwrap();
        assert_eq!(listing.len(), 3);

        let found = reader.meteor_fits_file("2025-08-12T01:02:07.000000").unwrap().unwrap();
        assert_eq!(
            found.file_name().unwrap(),
            "FF_US0001_20250812_010205_340_0001536.fits"
        );
        assert_eq!(reader.meteor_fits_file("2025-08-12T00:00:00").unwrap(), None);
        assert_eq!(reader.meteor_fits_file("garbage").unwrap(), None);
    }

    #[test]
    fn test_fits_time() {
        let path = Path::new("FF_US0001_20250812_010205_340_0001536.fits");
        let expected = iso_seconds("2025-08-12T01:02:05.340").unwrap();
        assert_eq!(fits_time(path), Some(expected));
        assert_eq!(fits_time(Path::new("FF_broken.fits")), None);
    }
}
