//! Application orchestration for the AkashRelay daemon
//!
//! Ties the serial reader thread to the demultiplexer, and runs the service
//! loop: hourly rotation checks on every tick, a drain-send-log cycle at
//! the configured send interval, and graceful shutdown on SIGINT/SIGTERM.

use crate::buffer::FrameBuffer;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::protocol::ProtocolDemux;
use crate::storage::LogRotator;
use crate::transport::{SerialTransport, Transport};
use crate::uplink::IngestClient;
use log::{debug, error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Consecutive serial read errors tolerated before the reader gives up
const MAX_READ_ERRORS: u32 = 10;

/// Service loop tick
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Main application structure that manages all components
pub struct RelayApp {
    config: AppConfig,
    buffer: Arc<FrameBuffer>,
    rotator: LogRotator,
    client: IngestClient,
    transport: Option<SerialTransport>,
    shutdown: Arc<AtomicBool>,
    reader_failed: Arc<AtomicBool>,
}

impl RelayApp {
    /// Create a new RelayApp instance
    ///
    /// Opens the serial device immediately so a missing or busy port fails
    /// fast with a configuration error instead of surfacing mid-run.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing relay for station {}", config.station.id);

        let transport = SerialTransport::open(&config.gnss.device, config.gnss.baud_rate)?;
        let buffer = Arc::new(FrameBuffer::new());
        let rotator = LogRotator::new(&config.storage.root_dir);
        let client = IngestClient::new(&config.station, &config.ingest);

        Ok(Self {
            config,
            buffer,
            rotator,
            client,
            transport: Some(transport),
            shutdown: Arc::new(AtomicBool::new(false)),
            reader_failed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start the reader thread and run the service loop until shutdown
    pub fn run(&mut self) -> Result<()> {
        self.rotator.initialize()?;

        let reader_handle = self.spawn_reader_thread()?;
        self.setup_signal_handler();

        let send_interval = Duration::from_secs(self.config.ingest.send_interval_secs.max(1));
        let mut last_send = Instant::now();

        info!("Relay running. Press Ctrl-C to stop.");

        while !self.shutdown.load(Ordering::Relaxed) {
            thread::sleep(TICK_INTERVAL);

            if self.reader_failed.load(Ordering::Relaxed) {
                error!("Reader thread terminated after repeated errors, shutting down");
                self.shutdown.store(true, Ordering::Relaxed);
                break;
            }

            if let Err(e) = self.rotator.check_rotation() {
                error!("Rotation check failed: {}", e);
            }

            if last_send.elapsed() >= send_interval {
                self.flush_cycle();
                last_send = Instant::now();
            }
        }

        info!("Shutting down...");
        self.shutdown.store(true, Ordering::Relaxed);
        if reader_handle.join().is_err() {
            error!("Reader thread panicked");
        }

        // Ship whatever accumulated between the last cycle and shutdown
        self.flush_cycle();
        self.rotator.close();
        info!("Final stats: {}", self.client.stats());

        if self.reader_failed.load(Ordering::Relaxed) {
            return Err(Error::Other("serial reader failed".to_string()));
        }
        Ok(())
    }

    /// Drain the buffer once for both consumers: uplink and durable log
    ///
    /// Both see the identical set of records; a failed send still lets the
    /// records reach disk and the buffer stay drained.
    fn flush_cycle(&mut self) {
        let (nmea, ubx) = self.buffer.drain();
        if nmea.is_empty() && ubx.is_empty() {
            return;
        }

        let recv_ts = epoch_seconds();
        self.client.send_batch(&nmea, &ubx, recv_ts);

        for line in &nmea {
            if let Err(e) = self.rotator.write_nmea(line, recv_ts) {
                error!("Error writing NMEA: {}", e);
            }
        }
        for frame in &ubx {
            if let Err(e) = self.rotator.write_ubx(frame, recv_ts) {
                error!("Error writing UBX: {}", e);
            }
        }

        if self.client.sequence_number() % 60 == 0 {
            info!("Uplink stats: {}", self.client.stats());
        }
    }

    /// Spawn the dedicated serial reader thread
    fn spawn_reader_thread(&mut self) -> Result<JoinHandle<()>> {
        let transport = self
            .transport
            .take()
            .ok_or_else(|| Error::Other("reader already started".to_string()))?;
        let demux = ProtocolDemux::new(Arc::clone(&self.buffer));
        let shutdown = Arc::clone(&self.shutdown);
        let failed = Arc::clone(&self.reader_failed);

        let handle = thread::Builder::new()
            .name("gnss-reader".to_string())
            .spawn(move || reader_loop(transport, demux, shutdown, failed))?;

        info!("GNSS reader started");
        Ok(handle)
    }

    /// Setup signal handler for graceful shutdown
    fn setup_signal_handler(&self) {
        let shutdown = Arc::clone(&self.shutdown);

        thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                let mut signals =
                    Signals::new([SIGINT, SIGTERM]).expect("Failed to register signal handlers");

                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {:?}, initiating shutdown...", sig);
                    shutdown.store(true, Ordering::Relaxed);
                }
            })
            .expect("Failed to spawn signal handler thread");
    }
}

/// Blocking read loop feeding the demultiplexer
///
/// Runs until shutdown. Read errors back off briefly and are tolerated up
/// to [`MAX_READ_ERRORS`] in a row, after which the fatal flag is raised
/// for the service loop and the thread exits.
fn reader_loop<T: Transport>(
    mut transport: T,
    mut demux: ProtocolDemux,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
) {
    debug!("Serial reader loop started");
    let mut chunk = [0u8; 4096];
    let mut consecutive_errors: u32 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match transport.read(&mut chunk) {
            Ok(0) => {
                // Nothing available within the port timeout
                thread::sleep(Duration::from_millis(10));
            }
            Ok(n) => {
                demux.process(&chunk[..n]);
                consecutive_errors = 0;
            }
            Err(e) => {
                consecutive_errors += 1;
                error!(
                    "Serial read error ({}/{}): {}",
                    consecutive_errors, MAX_READ_ERRORS, e
                );
                if consecutive_errors >= MAX_READ_ERRORS {
                    error!("Too many consecutive read errors, stopping reader");
                    failed.store(true, Ordering::Relaxed);
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    let stats = demux.stats();
    info!(
        "Reader loop ended: nmea {} emitted / {} dropped, ubx {} emitted / {} dropped, {} hard resets",
        stats.nmea_emitted,
        stats.nmea_dropped,
        stats.ubx_emitted,
        stats.ubx_dropped,
        stats.hard_resets
    );
}

/// Seconds since epoch as f64
fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{nmea, ubx::build_frame};
    use crate::transport::MockTransport;

    #[test]
    fn test_reader_loop_feeds_buffer_from_transport() {
        let transport = MockTransport::new();
        let sentence = nmea::with_checksum("GPGGA,123519,4807.038,N");
        let frame = build_frame(0x01, 0x07, &[1, 2, 3, 4]);
        transport.inject_read(format!("{}\r\n", sentence).as_bytes());
        transport.inject_read(&frame);

        let buffer = Arc::new(FrameBuffer::new());
        let demux = ProtocolDemux::new(Arc::clone(&buffer));
        let shutdown = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let loop_shutdown = Arc::clone(&shutdown);
        let loop_failed = Arc::clone(&failed);
        let reader = thread::spawn(move || {
            reader_loop(transport, demux, loop_shutdown, loop_failed);
        });

        // Give the loop a couple of ticks to drain the mock, then stop it
        thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::Relaxed);
        reader.join().unwrap();

        let (lines, frames) = buffer.drain();
        assert_eq!(lines, vec![sentence]);
        assert_eq!(frames, vec![frame]);
        assert!(!failed.load(Ordering::Relaxed));
    }
}
