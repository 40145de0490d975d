//! Durable on-disk storage of the raw GNSS stream
//!
//! Layout under the configured root:
//!   `YYYY/MM/DD/HH.nmea`: one timestamped sentence per line
//!   `YYYY/MM/DD/HH.ubx`: 8-byte little-endian f64 timestamp + frame bytes
//!
//! Completed hours are compressed to `.zst` with a `.zst.sha256` sidecar;
//! see [`archive`] for the crash-safety ordering.

pub mod archive;
mod rotator;

pub use rotator::LogRotator;

/// Flush and fsync after roughly this many bytes written
pub const FSYNC_INTERVAL_BYTES: u64 = 1_000_000;
