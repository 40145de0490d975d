//! Shared frame buffer between the reader thread and the service loop
//!
//! The demultiplexer appends validated records; the service loop drains the
//! whole accumulated set in one atomic swap. Both sides hold the lock only
//! for the duration of the copy, never across I/O.

use parking_lot::Mutex;
use std::mem;

/// Mutex-guarded pair of record sequences with an atomic drain
pub struct FrameBuffer {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    nmea: Vec<String>,
    ubx: Vec<Vec<u8>>,
}

impl FrameBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        FrameBuffer {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Append a validated NMEA sentence
    pub fn append_nmea(&self, line: String) {
        self.inner.lock().nmea.push(line);
    }

    /// Append a validated UBX frame (exact wire bytes)
    pub fn append_ubx(&self, frame: Vec<u8>) {
        self.inner.lock().ubx.push(frame);
    }

    /// Atomically take and clear everything accumulated since the last drain
    ///
    /// Returns `(nmea_lines, ubx_frames)`. A single drain feeds both the
    /// uplink and the on-disk log so the two consumers always observe the
    /// identical set of records.
    pub fn drain(&self) -> (Vec<String>, Vec<Vec<u8>>) {
        let mut inner = self.inner.lock();
        (mem::take(&mut inner.nmea), mem::take(&mut inner.ubx))
    }

    /// Number of buffered records as `(nmea, ubx)`
    pub fn len(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.nmea.len(), inner.ubx.len())
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.nmea.is_empty() && inner.ubx.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_everything_and_clears() {
        let buffer = FrameBuffer::new();
        buffer.append_nmea("$GPGGA,1".to_string());
        buffer.append_nmea("$GPGGA,2".to_string());
        buffer.append_ubx(vec![0xB5, 0x62, 0x01]);
        assert_eq!(buffer.len(), (2, 1));

        let (nmea, ubx) = buffer.drain();
        assert_eq!(nmea.len(), 2);
        assert_eq!(ubx.len(), 1);
        assert_eq!(nmea[0], "$GPGGA,1");
        assert_eq!(ubx[0], vec![0xB5, 0x62, 0x01]);

        // Second drain is empty
        let (nmea, ubx) = buffer.drain();
        assert!(nmea.is_empty());
        assert!(ubx.is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_append_after_drain() {
        let buffer = FrameBuffer::new();
        buffer.append_nmea("$A".to_string());
        buffer.drain();
        buffer.append_nmea("$B".to_string());

        let (nmea, _) = buffer.drain();
        assert_eq!(nmea, vec!["$B".to_string()]);
    }
}
