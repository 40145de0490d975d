//! AkashRelay - GNSS telemetry relay daemon
//!
//! Reads the mixed NMEA/UBX stream from a serial-attached GNSS receiver,
//! demultiplexes and validates both protocols, preserves the raw records in
//! hourly compressed-and-checksummed log segments, and forwards batches to
//! a central collection service.

pub mod app;
pub mod buffer;
pub mod config;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod transport;
pub mod uplink;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
