//! Configuration for the AkashRelay daemon
//!
//! Loads configuration from a TOML file with the parameters needed for
//! serial capture, on-disk archival and batch uplink.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub station: StationConfig,
    pub gnss: GnssConfig,
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
}

/// Station identity and antenna position
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationConfig {
    /// Station ID (must match a registered node on the ingest side)
    pub id: String,
    /// Human-readable station name
    pub name: String,
    /// Whether this station occupies a surveyed reference position
    pub is_reference: bool,
    /// Antenna latitude in decimal degrees
    pub latitude: f64,
    /// Antenna longitude in decimal degrees
    pub longitude: f64,
    /// Antenna height above mean sea level in meters
    pub antenna_height: f64,
}

/// GNSS receiver serial connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GnssConfig {
    /// Serial device path (e.g., `/dev/ttyAMA0`, `/dev/ttyACM0`)
    pub device: String,
    /// Baud rate for the serial connection
    pub baud_rate: u32,
}

/// Central-ingest uplink
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Central-ingest endpoint URL
    pub url: String,
    /// Bearer token for authentication
    pub api_key: String,
    /// Seconds between batch sends
    pub send_interval_secs: u64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Local log storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for hourly GNSS log files
    pub root_dir: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Default configuration for a reference station
    ///
    /// Suitable for testing and development. Production deployments
    /// should use a proper TOML configuration file.
    pub fn reference_defaults() -> Self {
        Self {
            station: StationConfig {
                id: "station-001".to_string(),
                name: "Test Ground Node".to_string(),
                is_reference: true,
                latitude: 25.2731,
                longitude: 51.6080,
                antenna_height: 10.5,
            },
            gnss: GnssConfig {
                device: "/dev/ttyAMA0".to_string(),
                baud_rate: 115_200,
            },
            ingest: IngestConfig {
                url: "http://localhost:8000/api/v1/ingest".to_string(),
                api_key: String::new(),
                send_interval_secs: 1,
                timeout_secs: 10,
            },
            storage: StorageConfig {
                root_dir: "/data/gnss".to_string(),
            },
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::reference_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::reference_defaults();
        assert_eq!(config.gnss.device, "/dev/ttyAMA0");
        assert_eq!(config.gnss.baud_rate, 115_200);
        assert_eq!(config.ingest.send_interval_secs, 1);
        assert_eq!(config.storage.root_dir, "/data/gnss");
        assert!(config.station.is_reference);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::reference_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        // Should contain all sections
        assert!(toml_string.contains("[station]"));
        assert!(toml_string.contains("[gnss]"));
        assert!(toml_string.contains("[ingest]"));
        assert!(toml_string.contains("[storage]"));

        // Should contain key values
        assert!(toml_string.contains("baud_rate = 115200"));
        assert!(toml_string.contains("device = \"/dev/ttyAMA0\""));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[station]
id = "qatar-ref-02"
name = "Doha Reference"
is_reference = false
latitude = 25.3
longitude = 51.5
antenna_height = 4.0

[gnss]
device = "/dev/ttyACM0"
baud_rate = 921600

[ingest]
url = "https://ingest.example.org/api/v1/ingest"
api_key = "secret"
send_interval_secs = 5
timeout_secs = 3

[storage]
root_dir = "/var/lib/gnss"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.station.id, "qatar-ref-02");
        assert_eq!(config.gnss.baud_rate, 921_600);
        assert_eq!(config.ingest.send_interval_secs, 5);
        assert!(!config.station.is_reference);
    }
}
