//! Batch message posted to the central ingest service

use serde::{Deserialize, Serialize};

/// One send cycle's worth of validated records
///
/// `nmea_raw` carries the sentences exactly as validated; `ubx_raw` carries
/// base64-encoded frame bytes. `known_position` is `[latitude, longitude,
/// height]` and is present only for reference stations.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TelemetryBatch {
    pub station_id: String,
    pub station_name: String,
    /// Random UUID identifying this batch
    pub batch_id: String,
    /// Monotonically increasing per process lifetime, starts at 1
    pub sequence_number: u64,
    /// Seconds since epoch at drain time
    pub recv_ts: f64,
    pub nmea_raw: Vec<String>,
    pub ubx_raw: Vec<String>,
    pub is_reference_station: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_position: Option<[f64; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: Option<[f64; 3]>) -> TelemetryBatch {
        TelemetryBatch {
            station_id: "station-001".to_string(),
            station_name: "Test Ground Node".to_string(),
            batch_id: "00000000-0000-4000-8000-000000000000".to_string(),
            sequence_number: 1,
            recv_ts: 1_700_000_000.5,
            nmea_raw: vec!["$GPGGA,1*7A".to_string()],
            ubx_raw: vec!["tWIKCQAAE0M=".to_string()],
            is_reference_station: position.is_some(),
            known_position: position,
        }
    }

    #[test]
    fn test_known_position_serialized_for_reference_station() {
        let json = serde_json::to_value(sample(Some([25.2731, 51.608, 10.5]))).unwrap();
        assert_eq!(json["known_position"][0], 25.2731);
        assert_eq!(json["sequence_number"], 1);
    }

    #[test]
    fn test_known_position_omitted_otherwise() {
        let json = serde_json::to_value(sample(None)).unwrap();
        assert!(json.get("known_position").is_none());
        assert_eq!(json["is_reference_station"], false);
    }

    #[test]
    fn test_roundtrip() {
        let batch = sample(Some([1.0, 2.0, 3.0]));
        let json = serde_json::to_string(&batch).unwrap();
        let back: TelemetryBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back.nmea_raw, batch.nmea_raw);
        assert_eq!(back.known_position, Some([1.0, 2.0, 3.0]));
    }
}
