//! Batch sender for the central ingest service

use super::messages::TelemetryBatch;
use crate::config::{IngestConfig, StationConfig};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use std::time::Duration;
use uuid::Uuid;

/// Posts telemetry batches with a bounded per-call timeout
///
/// Delivery is at-most-once: a non-202 response or transport error is
/// logged and counted, and the cycle's records are not resent.
pub struct IngestClient {
    agent: ureq::Agent,
    url: String,
    auth_header: String,
    station: StationConfig,
    sequence_number: u64,
    batches_sent: u64,
    batches_failed: u64,
}

impl IngestClient {
    /// Create a client for the configured endpoint
    pub fn new(station: &StationConfig, ingest: &IngestConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(ingest.timeout_secs))
            .build();

        log::info!("Network sender initialized: {}", station.id);
        log::info!("Target: {}", ingest.url);
        log::info!("Send interval: {}s", ingest.send_interval_secs);

        IngestClient {
            agent,
            url: ingest.url.clone(),
            auth_header: format!("Bearer {}", ingest.api_key),
            station: station.clone(),
            sequence_number: 0,
            batches_sent: 0,
            batches_failed: 0,
        }
    }

    /// Batches attempted so far (successful or not)
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Build the next batch, advancing the sequence number
    fn build_batch(&mut self, nmea: &[String], ubx: &[Vec<u8>], recv_ts: f64) -> TelemetryBatch {
        self.sequence_number += 1;

        TelemetryBatch {
            station_id: self.station.id.clone(),
            station_name: self.station.name.clone(),
            batch_id: Uuid::new_v4().to_string(),
            sequence_number: self.sequence_number,
            recv_ts,
            nmea_raw: nmea.to_vec(),
            ubx_raw: ubx.iter().map(|frame| BASE64.encode(frame)).collect(),
            is_reference_station: self.station.is_reference,
            known_position: self.station.is_reference.then(|| {
                [
                    self.station.latitude,
                    self.station.longitude,
                    self.station.antenna_height,
                ]
            }),
        }
    }

    /// Send one batch; returns true if the service accepted it (HTTP 202)
    pub fn send_batch(&mut self, nmea: &[String], ubx: &[Vec<u8>], recv_ts: f64) -> bool {
        let batch = self.build_batch(nmea, ubx, recv_ts);

        let result = self
            .agent
            .post(&self.url)
            .set("Authorization", &self.auth_header)
            .send_json(&batch);

        match result {
            Ok(response) if response.status() == 202 => {
                self.batches_sent += 1;
                log::info!(
                    "Batch {} accepted (seq={}, nmea={}, ubx={})",
                    &batch.batch_id[..8],
                    batch.sequence_number,
                    batch.nmea_raw.len(),
                    batch.ubx_raw.len()
                );
                true
            }
            Ok(response) => {
                self.batches_failed += 1;
                log::error!("Batch rejected: unexpected status {}", response.status());
                false
            }
            Err(ureq::Error::Status(code, response)) => {
                self.batches_failed += 1;
                let body = response.into_string().unwrap_or_default();
                log::error!("Batch rejected: {} - {}", code, body);
                false
            }
            Err(e) => {
                self.batches_failed += 1;
                log::error!("Network error: {}", e);
                false
            }
        }
    }

    /// Transmission statistics for the periodic status line
    pub fn stats(&self) -> String {
        let total = self.batches_sent + self.batches_failed;
        if total == 0 {
            return "No batches sent yet".to_string();
        }
        let success_rate = (self.batches_sent as f64 / total as f64) * 100.0;
        format!(
            "{} sent, {} failed, success rate={:.1}%",
            self.batches_sent, self.batches_failed, success_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::protocol::ubx::build_frame;

    fn client() -> IngestClient {
        let config = AppConfig::reference_defaults();
        IngestClient::new(&config.station, &config.ingest)
    }

    #[test]
    fn test_sequence_number_starts_at_one() {
        let mut client = client();
        let batch = client.build_batch(&[], &[], 0.0);
        assert_eq!(batch.sequence_number, 1);
        let batch = client.build_batch(&[], &[], 0.0);
        assert_eq!(batch.sequence_number, 2);
    }

    #[test]
    fn test_batch_base64_roundtrip() {
        let mut client = client();
        let frame = build_frame(0x0A, 0x09, &[0xAA, 0xBB]);
        let batch = client.build_batch(&[], std::slice::from_ref(&frame), 0.0);

        assert_eq!(batch.ubx_raw.len(), 1);
        assert_eq!(BASE64.decode(&batch.ubx_raw[0]).unwrap(), frame);
    }

    #[test]
    fn test_reference_station_carries_position() {
        let mut client = client();
        let batch = client.build_batch(&[], &[], 1.5);
        assert_eq!(batch.known_position, Some([25.2731, 51.608, 10.5]));
        assert!(batch.is_reference_station);
        assert_eq!(batch.recv_ts, 1.5);
    }

    #[test]
    fn test_stats_line() {
        let mut client = client();
        assert_eq!(client.stats(), "No batches sent yet");
        client.batches_sent = 9;
        client.batches_failed = 1;
        assert_eq!(client.stats(), "9 sent, 1 failed, success rate=90.0%");
    }
}
