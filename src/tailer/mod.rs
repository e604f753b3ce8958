//! # Log Tailer
//!
//! Follows the newest RMS log file in a directory and hands out lines as
//! they are appended.
//!
//! This module handles:
//! - Picking the active log (newest modification time matching a glob)
//! - Restarting from offset 0 when RMS rotates to a new file, after handing
//!   out whatever was still written to the old one
//! - Returning complete lines only; a partial last line waits for the next poll
//! - Extracting the station identifier from the log file name

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::Result;

/// Read position within the active log file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailState {
    /// Log file currently followed
    pub active: Option<PathBuf>,
    /// Bytes consumed so far (always at a line boundary)
    pub offset: u64,
    /// File size observed at the last poll
    pub size: u64,
}

/// Incremental reader for the active log file.
#[derive(Debug, Clone)]
pub struct LogTailer {
    pattern: String,
    state: TailState,
}

impl LogTailer {
    /// Creates a tailer for files matching `pattern` (e.g. `log_*.log`).
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            state: TailState::default(),
        }
    }

    /// Glob pattern used to find log files.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Current read position.
    #[must_use]
    pub fn state(&self) -> &TailState {
        &self.state
    }

    /// Continue following `path` from `offset` without re-reading it.
    pub fn resume_at(&mut self, path: PathBuf, offset: u64) {
        self.state = TailState {
            active: Some(path),
            offset,
            size: offset,
        };
    }

    /// Read the lines appended since the last poll.
    ///
    /// # Arguments
    ///
    /// * `log_dir` - Directory holding the RMS logs
    ///
    /// # Returns
    ///
    /// * `Result<Vec<String>>` - New complete lines, oldest first. Empty if no
    ///   log file exists yet or nothing new has been written.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be scanned or the log cannot be read
    pub fn poll(&mut self, log_dir: &Path) -> Result<Vec<String>> {
        let Some(newest) = newest_log_file(log_dir, &self.pattern)? else {
            return Ok(Vec::new());
        };

        let mut lines = Vec::new();
        if self.state.active.as_deref() != Some(newest.as_path()) {
            if let Some(previous) = self.state.active.take() {
                lines = drain_rotated(&previous, self.state.offset);
            }
            info!("Following log {}", newest.display());
            self.state = TailState {
                active: Some(newest.clone()),
                offset: 0,
                size: 0,
            };
        }

        lines.extend(self.read_active(&newest)?);
        Ok(lines)
    }

    fn read_active(&mut self, path: &Path) -> Result<Vec<String>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            // Rotated away between the scan and the open
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let size = file.metadata()?.len();
        if size < self.state.offset {
            warn!(
                "Log {} shrank from {} to {} bytes, reading from the start",
                path.display(),
                self.state.offset,
                size
            );
            self.state.offset = 0;
        }
        self.state.size = size;

        if size == self.state.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.state.offset))?;
        let mut buf = Vec::new();
        file.take(size - self.state.offset).read_to_end(&mut buf)?;

        let (lines, consumed) = split_complete_lines(&buf);
        if consumed == 0 {
            debug!("Only a partial line is available in {}", path.display());
        }
        self.state.offset += consumed as u64;
        Ok(lines)
    }
}

/// Everything written to a rotated-out log after `offset`.
///
/// The file will not grow again, so an unterminated last line is returned
/// as well. Read failures are logged and yield nothing.
fn drain_rotated(path: &Path, offset: u64) -> Vec<String> {
    let read = File::open(path).and_then(|mut file| {
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    });

    let buf = match read {
        Ok(buf) => buf,
        Err(e) => {
            warn!("Failed to read the rest of rotated log {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let (mut lines, consumed) = split_complete_lines(&buf);
    let rest = String::from_utf8_lossy(&buf[consumed..]);
    let rest = rest.trim_end_matches(['\r', '\n']);
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    if !lines.is_empty() {
        debug!("Read {} late lines from {}", lines.len(), path.display());
    }
    lines
}

/// Split `buf` into its complete lines.
///
/// Returns the lines (without terminators) and the number of bytes they
/// span. Bytes after the last newline are not included.
#[must_use]
pub fn split_complete_lines(buf: &[u8]) -> (Vec<String>, usize) {
    let Some(end) = buf.iter().rposition(|&b| b == b'\n') else {
        return (Vec::new(), 0);
    };

    let complete = &buf[..=end];
    let lines = String::from_utf8_lossy(complete)
        .lines()
        .map(str::to_string)
        .collect();
    (lines, complete.len())
}

/// Log files matching `pattern` in `log_dir`, oldest modification first.
///
/// # Errors
///
/// Returns error if the pattern is invalid
pub fn log_files_oldest_first(log_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&log_dir.to_string_lossy()),
        pattern
    );

    let mut files: Vec<(SystemTime, PathBuf)> = glob::glob(&full)?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| {
            let meta = path.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().ok()?, path))
        })
        .collect();

    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// The most recently modified log file, if any.
///
/// # Errors
///
/// Returns error if the pattern is invalid
pub fn newest_log_file(log_dir: &Path, pattern: &str) -> Result<Option<PathBuf>> {
    Ok(log_files_oldest_first(log_dir, pattern)?.pop())
}

/// Station identifier embedded in a log name such as `log_US0001_20250809_132000.log`.
#[must_use]
pub fn station_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let mut parts = name.splitn(3, '_');
    let _prefix = parts.next()?;
    let code = parts.next()?;
    parts.next()?;

    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
