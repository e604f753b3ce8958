//! # Polling Driver
//!
//! The single writer: reads new log lines, runs them through the parser and
//! pushes the resulting documents into the [`TelemetryStore`].
//!
//! The driver owns the [`ParserContext`] and the [`LogTailer`]; neither is
//! ever touched from another thread. It runs on a dedicated OS thread,
//! sleeping between polls in short slices so a shutdown request is noticed
//! within one slice.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::parser::{parse_line, ParserContext};
use crate::store::TelemetryStore;
use crate::tailer::{log_files_oldest_first, split_complete_lines, station_id, LogTailer};

/// Reads the RMS logs and feeds the store.
#[derive(Debug)]
pub struct PollingDriver {
    log_dir: PathBuf,
    tailer: LogTailer,
    ctx: ParserContext,
    store: Arc<TelemetryStore>,
    poll_interval: Duration,
    sleep_slice: Duration,
    bootstrap_max_files: usize,
}

impl PollingDriver {
    /// Creates a driver for the log directory and timings in `config`.
    #[must_use]
    pub fn new(config: &Config, store: Arc<TelemetryStore>) -> Self {
        Self {
            log_dir: config.logs.log_dir.clone(),
            tailer: LogTailer::new(config.logs.pattern.clone()),
            ctx: ParserContext::new(),
            store,
            poll_interval: Duration::from_secs(config.logs.poll_interval_s),
            sleep_slice: Duration::from_millis(config.logs.shutdown_slice_ms),
            bootstrap_max_files: config.logs.bootstrap_max_files,
        }
    }

    /// Parser state, for inspection.
    #[must_use]
    pub fn context(&self) -> &ParserContext {
        &self.ctx
    }

    /// Tailer state, for inspection.
    #[must_use]
    pub fn tailer(&self) -> &LogTailer {
        &self.tailer
    }

    /// Replay the logs already on disk.
    ///
    /// Files are parsed oldest first so rollovers inside them fill the
    /// history; only the newest `bootstrap_max_files` are read. The tailer
    /// is left at the end of the newest file.
    ///
    /// # Errors
    ///
    /// Returns error if the log directory cannot be scanned. Unreadable
    /// individual files are logged and skipped.
    pub fn bootstrap(&mut self) -> Result<()> {
        let files = log_files_oldest_first(&self.log_dir, self.tailer.pattern())?;
        let skip = files.len().saturating_sub(self.bootstrap_max_files);

        for (index, path) in files.iter().enumerate() {
            let name = display_name(path);
            if index < skip {
                info!("Skipping log '{}'...", name);
                continue;
            }

            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to read log '{}': {}", name, e);
                    continue;
                }
            };

            info!("Parsing log '{}'...", name);
            let is_newest = index + 1 == files.len();
            if is_newest {
                // A trailing partial line is left for the tailer
                let (lines, consumed) = split_complete_lines(&bytes);
                self.apply_lines(&lines, station_id(path));
                self.tailer.resume_at(path.clone(), consumed as u64);
            } else {
                let lines: Vec<String> = String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_string)
                    .collect();
                self.apply_lines(&lines, station_id(path));
            }
        }

        Ok(())
    }

    /// Run one read-and-parse cycle.
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of lines parsed
    ///
    /// # Errors
    ///
    /// Returns error if the active log cannot be read
    pub fn poll_once(&mut self) -> Result<usize> {
        let lines = self.tailer.poll(&self.log_dir)?;
        let station = self.tailer.state().active.as_deref().and_then(station_id);

        if !lines.is_empty() {
            debug!("Parsing {} new log lines", lines.len());
        }
        self.apply_lines(&lines, station);
        Ok(lines.len())
    }

    /// Feed `lines` through the parser and publish the result.
    ///
    /// A document is published as soon as a line marks the end of the day,
    /// first without the marker so the archived copy holds everything up to
    /// the boundary.
    fn apply_lines(&mut self, lines: &[String], station: Option<String>) {
        let mut doc = self.store.get_current();
        let station_changed = station.is_some() && doc.station_id != station;
        if lines.is_empty() && !station_changed {
            return;
        }
        if station_changed {
            doc.station_id = station;
        }

        for line in lines {
            doc = parse_line(line, doc, &mut self.ctx);
            if doc.end_of_day {
                let mut settled = doc.clone();
                settled.end_of_day = false;
                self.store.set_current(settled);
                self.store.set_current(doc);
                doc = self.store.get_current();
            }
        }

        self.store.set_current(doc);
    }

    /// Poll until `shutdown` is set.
    ///
    /// Failed cycles are logged and the loop carries on with the next one.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!(
            "Watching {} every {}s",
            self.log_dir.display(),
            self.poll_interval.as_secs()
        );

        while !shutdown.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(e) = self.poll_once() {
                warn!("Failed to poll the most recent log: {}", e);
            }

            while !shutdown.load(Ordering::Relaxed) {
                let elapsed = cycle_start.elapsed();
                if elapsed >= self.poll_interval {
                    break;
                }
                thread::sleep(self.sleep_slice.min(self.poll_interval - elapsed));
            }
        }

        info!("Log polling stopped");
    }

    /// Start [`run`](Self::run) on its own named thread.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned
    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("log-poller".to_string())
            .spawn(move || self.run(shutdown))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::timestamp::to_iso;
    use chrono::NaiveDate;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.logs.log_dir = dir.to_path_buf();
        config.logs.poll_interval_s = 1;
        config.logs.shutdown_slice_ms = 20;
        config
    }

    fn append(path: &Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn set_age(path: &Path, seconds_ago: u64) {
        let file = OpenOptions::new().append(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(seconds_ago))
            .unwrap();
    }

    fn night_log(day: u32) -> String {
        format!(
            "2025/08/{d:02} 13:19:51-INFO-StartCapture-line:10 - Starting capture for 6.5 hours\n\
             2025/08/{d:02} 14:00:00-INFO-DetectStarsAndMeteors-line:30 - FF detected meteors: {d}\n\
             2025/08/{d:02} 19:49:51-INFO-StartCapture-line:11 - Ending capture...\n\
             2025/08/{d:02} 20:00:00-INFO-StartCapture-line:50 - Next start time: 2025-08-{n:02} 13:18:00 UTC\n",
            d = day,
            n = day + 1
        )
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_poll_once_without_logs() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TelemetryStore::default());
        let mut driver = PollingDriver::new(&test_config(dir.path()), Arc::clone(&store));

        assert_eq!(driver.poll_once().unwrap(), 0);
        assert!(store.get_current().is_untouched());
    }

    #[test]
    fn test_poll_once_publishes_lines_and_station() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log_US0001_20250809_131951.log");
        append(
            &log,
            "2025/08/09 13:19:51-INFO-StartCapture-line:10 - Starting capture for 6.5 hours\n\
             2025/08/09 13:20:00-INFO-DetectStarsAndMeteors-line:20 - Detected stars: 42\n",
        );

        let store = Arc::new(TelemetryStore::default());
        let mut driver = PollingDriver::new(&test_config(dir.path()), Arc::clone(&store));
        assert_eq!(driver.poll_once().unwrap(), 2);

        let doc = store.get_current();
        assert_eq!(doc.station_id.as_deref(), Some("US0001"));
        assert!(doc.capture.as_ref().unwrap().running);
        assert_eq!(doc.detections.as_ref().unwrap().n_star, 42);

        append(
            &log,
            "2025/08/09 13:21:00-INFO-DetectStarsAndMeteors-line:30 - 3 detected meteors: 3\n",
        );
        assert_eq!(driver.poll_once().unwrap(), 1);
        assert_eq!(store.get_current().detections.unwrap().n_meteor, 3);
        assert_eq!(
            to_iso(&store.current_last_modified()),
            "2025-08-09T13:21:00Z"
        );
    }

    #[test]
    fn test_rollover_inside_one_poll_archives_whole_night() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log_US0001_20250809_131951.log");
        append(&log, &night_log(9));
        append(
            &log,
            "2025/08/10 13:18:00-INFO-StartCapture-line:10 - Starting capture for 6.4 hours\n",
        );

        let store = Arc::new(TelemetryStore::default());
        let mut driver = PollingDriver::new(&test_config(dir.path()), Arc::clone(&store));
        driver.poll_once().unwrap();

        let archived = store.get_history(None).unwrap().document;
        assert_eq!(archived.detections.as_ref().unwrap().n_meteor, 9);
        assert_eq!(archived.station_id.as_deref(), Some("US0001"));

        let current = store.get_current();
        assert_eq!(current.run_date(), Some(date(10)));
        assert_eq!(current.detections.as_ref().unwrap().n_meteor, 0);
        assert!(driver.context().capture_started());
    }

    #[test]
    fn test_rollover_written_just_before_rotation() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("log_US0001_20250809_131951.log");
        let mut night = night_log(9);
        let next_start = night.lines().last().unwrap().to_string();
        night.truncate(night.len() - next_start.len() - 1);
        append(&old, &night);

        let store = Arc::new(TelemetryStore::default());
        let mut driver = PollingDriver::new(&test_config(dir.path()), Arc::clone(&store));
        assert_eq!(driver.poll_once().unwrap(), 3);

        append(&old, &format!("{}\n", next_start));
        set_age(&old, 60);
        append(
            &dir.path().join("log_US0001_20250810_131800.log"),
            "2025/08/10 13:18:00-INFO-StartCapture-line:10 - Starting capture for 6.4 hours\n",
        );
        assert_eq!(driver.poll_once().unwrap(), 2);

        let archived = store.get_history(None).unwrap().document;
        assert_eq!(archived.run_date(), Some(date(9)));
        assert_eq!(archived.detections.as_ref().unwrap().n_meteor, 9);
        assert_eq!(store.get_current().run_date(), Some(date(10)));
    }

    #[test]
    fn test_bootstrap_replays_recent_logs() {
        let dir = TempDir::new().unwrap();
        for (day, age) in [(5, 500), (6, 400), (7, 300), (8, 200)] {
            let log = dir.path().join(format!("log_US0001_202508{:02}_131951.log", day));
            append(&log, &night_log(day));
            set_age(&log, age);
        }

        let mut config = test_config(dir.path());
        config.logs.bootstrap_max_files = 3;
        let store = Arc::new(TelemetryStore::default());
        let mut driver = PollingDriver::new(&config, Arc::clone(&store));
        driver.bootstrap().unwrap();

        assert_eq!(store.list_history_dates(), vec![date(6), date(7), date(8)]);

        let newest = dir.path().join("log_US0001_20250808_131951.log");
        let state = driver.tailer().state();
        assert_eq!(state.active.as_deref(), Some(newest.as_path()));
        assert_eq!(state.offset, night_log(8).len() as u64);

        // Nothing is parsed twice
        assert_eq!(driver.poll_once().unwrap(), 0);
        assert_eq!(store.history_len(), 3);
    }

    #[test]
    fn test_bootstrap_leaves_partial_line_for_tailer() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("log_US0001_20250809_131951.log");
        append(
            &log,
            "2025/08/09 13:20:00-INFO-DetectStarsAndMeteors-line:20 - Detected stars: 4",
        );

        let store = Arc::new(TelemetryStore::default());
        let mut driver = PollingDriver::new(&test_config(dir.path()), Arc::clone(&store));
        driver.bootstrap().unwrap();
        assert_eq!(driver.tailer().state().offset, 0);

        append(&log, "2\n");
        assert_eq!(driver.poll_once().unwrap(), 1);
        assert_eq!(store.get_current().detections.unwrap().n_star, 42);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        config.logs.poll_interval_s = 3600;

        let store = Arc::new(TelemetryStore::default());
        let driver = PollingDriver::new(&config, store);
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = driver.spawn(Arc::clone(&shutdown)).unwrap();

        thread::sleep(Duration::from_millis(50));
        let requested = Instant::now();
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(
            requested.elapsed() < Duration::from_secs(1),
            "driver should stop within one sleep slice"
        );
    }

    #[test]
    fn test_run_survives_failed_polls() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path());
        // Invalid glob makes every poll fail
        config.logs.pattern = "log_[.log".to_string();

        let driver = PollingDriver::new(&config, Arc::new(TelemetryStore::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = driver.spawn(Arc::clone(&shutdown)).unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished(), "loop keeps running after errors");
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
