//! Hourly log rotation for the NMEA/UBX file pair
//!
//! One file pair is open per UTC hour. Rotation closes, flushes and fsyncs
//! the pair, opens the next hour's pair and archives the hour just closed.
//! The open pair is never renamed or compressed while receiving writes.

use super::FSYNC_INTERVAL_BYTES;
use super::archive;
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// UTC hour identity of an open file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HourKey {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
}

impl HourKey {
    fn from_datetime(dt: DateTime<Utc>) -> Self {
        use chrono::Datelike;
        HourKey {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
        }
    }
}

/// An open hourly file pair with per-file fsync accounting
struct OpenHour {
    key: HourKey,
    nmea_path: PathBuf,
    ubx_path: PathBuf,
    nmea_file: File,
    ubx_file: File,
    nmea_written: u64,
    ubx_written: u64,
}

/// Owns the currently-open file pair and drives hourly archival
pub struct LogRotator {
    root: PathBuf,
    current: Option<OpenHour>,
}

impl LogRotator {
    /// Create a rotator writing under `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        LogRotator {
            root: root.as_ref().to_path_buf(),
            current: None,
        }
    }

    /// Open the current hour's pair and archive any leftover previous hour
    ///
    /// Called once at startup; picks up hours left uncompressed by an
    /// earlier crash or shutdown.
    pub fn initialize(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let now = Utc::now();
        self.open_hour(now)?;
        archive::rotate_previous_hour(&self.root, now);
        Ok(())
    }

    /// Rotate if the UTC hour has changed since the pair was opened
    pub fn check_rotation(&mut self) -> Result<()> {
        let now = Utc::now();
        self.rotate_to(now)
    }

    fn rotate_to(&mut self, now: DateTime<Utc>) -> Result<()> {
        let key = HourKey::from_datetime(now);
        if self.current.as_ref().is_some_and(|open| open.key == key) {
            return Ok(());
        }
        log::info!("Hour boundary detected, rotating log files");
        self.open_hour(now)?;
        archive::rotate_previous_hour(&self.root, now);
        Ok(())
    }

    /// Append a timestamped NMEA sentence
    ///
    /// Line format: `<ISO-8601 UTC> <sentence>\n`.
    pub fn write_nmea(&mut self, line: &str, timestamp: f64) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            return Ok(());
        };
        let ts = iso8601(timestamp);
        writeln!(open.nmea_file, "{} {}", ts, line)?;
        open.nmea_written += (ts.len() + line.len() + 2) as u64;

        if open.nmea_written >= FSYNC_INTERVAL_BYTES {
            open.nmea_file.flush()?;
            open.nmea_file.sync_all()?;
            open.nmea_written = 0;
        }
        Ok(())
    }

    /// Append a timestamped UBX frame
    ///
    /// Record format: 8-byte little-endian f64 epoch seconds, then the
    /// exact frame bytes.
    pub fn write_ubx(&mut self, frame: &[u8], timestamp: f64) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            return Ok(());
        };
        open.ubx_file.write_all(&timestamp.to_le_bytes())?;
        open.ubx_file.write_all(frame)?;
        open.ubx_written += (frame.len() + 8) as u64;

        if open.ubx_written >= FSYNC_INTERVAL_BYTES {
            open.ubx_file.flush()?;
            open.ubx_file.sync_all()?;
            open.ubx_written = 0;
        }
        Ok(())
    }

    /// Flush, fsync and close the pair, then archive the final hour
    ///
    /// Called on shutdown; the final hour is usually partial.
    pub fn close(&mut self) {
        log::info!("Closing log files");
        let Some(open) = self.current.take() else {
            return;
        };
        let (nmea_path, ubx_path) = (open.nmea_path.clone(), open.ubx_path.clone());
        Self::close_pair(open);

        for path in [nmea_path, ubx_path] {
            if let Err(e) = archive::compress_and_checksum(&path) {
                log::error!("Failed to archive {}: {}", path.display(), e);
            }
        }
    }

    /// Close and fsync a pair, logging rather than propagating failures
    fn close_pair(mut open: OpenHour) {
        for (name, file) in [("NMEA", &mut open.nmea_file), ("UBX", &mut open.ubx_file)] {
            if let Err(e) = file.flush().and_then(|_| file.sync_all()) {
                log::warn!("Error closing {} file: {}", name, e);
            }
        }
    }

    /// Close any open pair and open the pair for `now`, creating directories
    fn open_hour(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(open) = self.current.take() {
            Self::close_pair(open);
        }

        let nmea_path = archive::hour_path(&self.root, now, "nmea");
        let ubx_path = archive::hour_path(&self.root, now, "ubx");
        if let Some(day_dir) = nmea_path.parent() {
            fs::create_dir_all(day_dir)?;
        }

        let nmea_file = OpenOptions::new().create(true).append(true).open(&nmea_path)?;
        let ubx_file = OpenOptions::new().create(true).append(true).open(&ubx_path)?;

        log::info!(
            "Opened new log files: {}, {}",
            nmea_path.file_name().unwrap_or_default().to_string_lossy(),
            ubx_path.file_name().unwrap_or_default().to_string_lossy()
        );

        self.current = Some(OpenHour {
            key: HourKey::from_datetime(now),
            nmea_path,
            ubx_path,
            nmea_file,
            ubx_file,
            nmea_written: 0,
            ubx_written: 0,
        });
        Ok(())
    }
}

/// ISO-8601 UTC timestamp with microsecond precision from epoch seconds
fn iso8601(timestamp: f64) -> String {
    let secs = timestamp.trunc() as i64;
    let nanos = ((timestamp.fract() * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Micros, false)
}
