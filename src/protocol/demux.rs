//! Byte-stream state machine separating NMEA sentences from UBX frames
//!
//! The parser consumes arbitrarily-sized chunks and appends validated
//! records to the shared [`FrameBuffer`]. All partial-message state lives
//! here, so a frame or sentence split across any chunk boundary parses the
//! same as if it arrived in one piece.
//!
//! Corruption recovery:
//! - an implausible declared length counts toward a consecutive-error
//!   threshold; crossing it wipes all scratch state (hard reset)
//! - a complete frame with a bad checksum is dropped and fully consumed
//! - UBX sync bytes appearing inside an NMEA sentence abandon the sentence
//!   and are reprocessed as a potential frame start

use super::{
    MAX_NMEA_LINE_LEN, MAX_UBX_ERRORS_BEFORE_RESYNC, MAX_UBX_FRAME_LEN, MIN_NMEA_LINE_LEN, nmea,
    ubx,
};
use crate::buffer::FrameBuffer;
use std::mem;
use std::sync::Arc;

/// Parser position within the interleaved stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    /// Scanning for the next message start
    Searching,
    /// Accumulating an ASCII sentence after `$`
    InAsciiLine,
}

/// Outcome of a binary-frame extraction attempt
enum UbxStep {
    /// A complete frame was handled (emitted or dropped); skip this many bytes
    Consumed(usize),
    /// Garbage sync match; skip just the two sync bytes
    SkipSync,
    /// Not enough bytes staged; retain them and wait for the next chunk
    NeedMore,
}

/// Counters exposed for the periodic status line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub nmea_emitted: u64,
    pub nmea_dropped: u64,
    pub ubx_emitted: u64,
    pub ubx_dropped: u64,
    pub hard_resets: u64,
}

/// Stream demultiplexer feeding the shared frame buffer
pub struct ProtocolDemux {
    buffer: Arc<FrameBuffer>,
    state: ParserState,
    nmea_line: Vec<u8>,
    ubx_pending: Vec<u8>,
    ubx_error_count: u32,
    stats: DemuxStats,
}

impl ProtocolDemux {
    /// Create a demultiplexer appending into `buffer`
    pub fn new(buffer: Arc<FrameBuffer>) -> Self {
        ProtocolDemux {
            buffer,
            state: ParserState::Searching,
            nmea_line: Vec::new(),
            ubx_pending: Vec::new(),
            ubx_error_count: 0,
            stats: DemuxStats::default(),
        }
    }

    /// Snapshot of the emit/drop counters
    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// Consume one chunk of serial data
    ///
    /// Purely effectful: validated records land in the frame buffer,
    /// everything else is discarded with a log line. The only early exit is
    /// an incomplete UBX frame, which is retained and prefixed onto the
    /// next chunk.
    pub fn process(&mut self, chunk: &[u8]) {
        // Prepend any partial UBX data from the previous read
        let data: Vec<u8> = if self.ubx_pending.is_empty() {
            chunk.to_vec()
        } else {
            let mut joined = mem::take(&mut self.ubx_pending);
            joined.extend_from_slice(chunk);
            joined
        };

        let mut i = 0;
        while i < data.len() {
            let byte = data[i];

            match self.state {
                ParserState::Searching => {
                    if byte == ubx::SYNC1 {
                        if i + 1 >= data.len() {
                            // Chunk ends on a possible first sync byte; keep
                            // it so a frame split between its sync bytes
                            // still parses
                            self.ubx_pending.push(byte);
                            return;
                        }
                        if data[i + 1] == ubx::SYNC2 {
                            match self.step_ubx(&data[i..]) {
                                UbxStep::Consumed(n) => {
                                    i += n;
                                }
                                UbxStep::SkipSync => {
                                    i += 2;
                                }
                                UbxStep::NeedMore => {
                                    // Cross-chunk continuation point
                                    self.ubx_pending = data[i..].to_vec();
                                    return;
                                }
                            }
                            continue;
                        }
                        // Lone 0xB5, not a frame start
                        i += 1;
                    } else if byte == b'$' {
                        self.state = ParserState::InAsciiLine;
                        self.nmea_line.clear();
                        self.nmea_line.push(byte);
                        i += 1;
                    } else {
                        // Ignore other bytes while searching
                        i += 1;
                    }
                }

                ParserState::InAsciiLine => {
                    self.nmea_line.push(byte);

                    if byte == b'\n' {
                        self.finish_nmea_line();
                        self.state = ParserState::Searching;
                        i += 1;
                    } else if self.nmea_line.len() > MAX_NMEA_LINE_LEN {
                        log::warn!(
                            "NMEA line too long ({} bytes), discarding",
                            self.nmea_line.len()
                        );
                        self.stats.nmea_dropped += 1;
                        self.nmea_line.clear();
                        self.state = ParserState::Searching;
                        i += 1;
                    } else if byte == ubx::SYNC1
                        && i + 1 < data.len()
                        && data[i + 1] == ubx::SYNC2
                    {
                        // Corruption: binary frame start inside a sentence.
                        // Abandon the partial line and reprocess the sync
                        // bytes from Searching without consuming them.
                        log::warn!("UBX sync bytes inside NMEA sentence, resyncing");
                        self.stats.nmea_dropped += 1;
                        self.nmea_line.clear();
                        self.state = ParserState::Searching;
                    } else {
                        i += 1;
                    }
                }
            }
        }
    }

    /// Attempt binary-frame extraction at a sync match
    ///
    /// `data` starts at the 0xB5 byte and runs to the end of the joined
    /// chunk.
    fn step_ubx(&mut self, data: &[u8]) -> UbxStep {
        if data.len() >= ubx::HEADER_LEN {
            // Length field is present; sanity-check before staging more
            let length = ubx::payload_len(data).unwrap_or(0);
            if length > MAX_UBX_FRAME_LEN {
                self.ubx_error_count += 1;
                log::warn!(
                    "UBX declared length {} exceeds {} byte limit, skipping sync bytes (error count: {})",
                    length,
                    MAX_UBX_FRAME_LEN,
                    self.ubx_error_count
                );
                if self.ubx_error_count >= MAX_UBX_ERRORS_BEFORE_RESYNC {
                    log::error!(
                        "UBX parser desynchronized after {} consecutive errors, resetting parser state",
                        self.ubx_error_count
                    );
                    self.hard_reset();
                }
                return UbxStep::SkipSync;
            }

            let total = ubx::HEADER_LEN + length + ubx::CHECKSUM_LEN;
            if data.len() >= total {
                let frame = &data[..total];
                if ubx::validate_frame(frame) {
                    self.buffer.append_ubx(frame.to_vec());
                    self.stats.ubx_emitted += 1;
                    self.ubx_error_count = 0;
                } else {
                    log::warn!("UBX frame failed checksum validation, dropping {} bytes", total);
                    self.stats.ubx_dropped += 1;
                }
                return UbxStep::Consumed(total);
            }
        }
        UbxStep::NeedMore
    }

    /// Validate and emit the accumulated sentence
    fn finish_nmea_line(&mut self) {
        let line = String::from_utf8_lossy(&self.nmea_line)
            .trim()
            .to_string();
        self.nmea_line.clear();

        if !line.starts_with('$') || line.len() <= MIN_NMEA_LINE_LEN {
            return;
        }

        if nmea::validate_checksum(&line) {
            self.buffer.append_nmea(line);
            self.stats.nmea_emitted += 1;
        } else {
            let preview: String = line.chars().take(20).collect();
            log::debug!("NMEA checksum failed: {}...", preview);
            self.stats.nmea_dropped += 1;
        }
    }

    /// Hard reset after sustained desynchronization: wipe all scratch state
    fn hard_reset(&mut self) {
        self.state = ParserState::Searching;
        self.nmea_line.clear();
        self.ubx_pending.clear();
        self.ubx_error_count = 0;
        self.stats.hard_resets += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ubx::build_frame;

    fn demux() -> (ProtocolDemux, Arc<FrameBuffer>) {
        let buffer = Arc::new(FrameBuffer::new());
        (ProtocolDemux::new(Arc::clone(&buffer)), buffer)
    }

    #[test]
    fn test_single_nmea_sentence_with_checksum() {
        let (mut d, buf) = demux();
        let sentence = nmea::with_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9");
        d.process(format!("{}\r\n", sentence).as_bytes());

        let (lines, frames) = buf.drain();
        assert_eq!(lines, vec![sentence]);
        assert!(frames.is_empty());
        assert_eq!(d.stats().nmea_emitted, 1);
    }

    #[test]
    fn test_nmea_bad_checksum_dropped() {
        let (mut d, buf) = demux();
        d.process(b"$GPGGA,123519,4807.038,N*00\r\n");

        assert!(buf.is_empty());
        assert_eq!(d.stats().nmea_dropped, 1);
    }

    #[test]
    fn test_nmea_without_checksum_accepted() {
        let (mut d, buf) = demux();
        d.process(b"$GPTXT,01,01,02,ANTSTATUS=OK\r\n");

        let (lines, _) = buf.drain();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "$GPTXT,01,01,02,ANTSTATUS=OK");
    }

    #[test]
    fn test_noise_without_dollar_never_emitted() {
        let (mut d, buf) = demux();
        d.process(b"garbage with no start marker\r\nmore noise\n");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_ubx_frame_exact_bytes() {
        // Spec scenario: B5 62 0A 09 02 00 AA BB + running-sum pair
        let (mut d, buf) = demux();
        let frame = build_frame(0x0A, 0x09, &[0xAA, 0xBB]);
        assert_eq!(frame.len(), 10);
        d.process(&frame);

        let (_, frames) = buf.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], frame);
    }

    #[test]
    fn test_ubx_frame_split_at_every_position() {
        let frame = build_frame(0x01, 0x07, &[0x10, 0x20, 0x30, 0x40, 0x50]);
        for split in 1..frame.len() {
            let (mut d, buf) = demux();
            d.process(&frame[..split]);
            d.process(&frame[split..]);

            let (_, frames) = buf.drain();
            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0], frame, "split at {}", split);
        }
    }

    #[test]
    fn test_ubx_bad_checksum_dropped_and_consumed() {
        let (mut d, buf) = demux();
        let mut bad = build_frame(0x02, 0x13, &[1, 2, 3]);
        let n = bad.len();
        bad[n - 1] ^= 0xFF;

        // A valid sentence after the corrupt frame must still parse
        let mut stream = bad.clone();
        stream.extend_from_slice(b"$GPZDA,201530.00,04,07,2002,00,00*60\r\n");
        d.process(&stream);

        let (lines, frames) = buf.drain();
        assert!(frames.is_empty());
        assert_eq!(d.stats().ubx_dropped, 1);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_oversized_length_consumes_two_bytes_and_resumes() {
        let (mut d, buf) = demux();
        // Declared length 0xFFFF, then a valid frame in the same chunk
        let mut stream = vec![ubx::SYNC1, ubx::SYNC2, 0x01, 0x02, 0xFF, 0xFF];
        let good = build_frame(0x05, 0x01, &[0x00, 0x01]);
        stream.extend_from_slice(&good);
        d.process(&stream);

        let (_, frames) = buf.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], good);
        assert_eq!(d.stats().ubx_emitted, 1);
    }

    #[test]
    fn test_hard_reset_after_repeated_bad_lengths() {
        let (mut d, buf) = demux();
        let bad_sync = [ubx::SYNC1, ubx::SYNC2, 0x00, 0x00, 0xFF, 0xFF];
        for _ in 0..MAX_UBX_ERRORS_BEFORE_RESYNC {
            d.process(&bad_sync);
        }
        assert_eq!(d.stats().hard_resets, 1);
        assert!(buf.is_empty());

        // Parser still works after the reset
        let good = build_frame(0x0A, 0x04, &[]);
        d.process(&good);
        let (_, frames) = buf.drain();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_sync_bytes_inside_nmea_line_resync() {
        let (mut d, buf) = demux();
        let frame = build_frame(0x0A, 0x09, &[0xAA, 0xBB]);
        let mut stream = b"$GPGGA,truncated sentence".to_vec();
        stream.extend_from_slice(&frame);
        d.process(&stream);

        let (lines, frames) = buf.drain();
        assert!(lines.is_empty());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], frame);
        assert_eq!(d.stats().nmea_dropped, 1);
    }

    #[test]
    fn test_overlong_nmea_line_dropped() {
        let (mut d, buf) = demux();
        let mut noise = b"$".to_vec();
        noise.extend(std::iter::repeat_n(b'A', MAX_NMEA_LINE_LEN + 10));
        noise.extend_from_slice(b"\r\n");
        d.process(&noise);

        assert!(buf.is_empty());
        assert_eq!(d.stats().nmea_dropped, 1);
    }

    #[test]
    fn test_interleaved_stream() {
        let (mut d, buf) = demux();
        let sentence = nmea::with_checksum("GPRMC,123519,A,4807.038,N,01131.000,E");
        let frame_a = build_frame(0x01, 0x07, &[9; 16]);
        let frame_b = build_frame(0x0A, 0x09, &[]);

        let mut stream = Vec::new();
        stream.extend_from_slice(format!("{}\r\n", sentence).as_bytes());
        stream.extend_from_slice(&frame_a);
        stream.extend_from_slice(format!("{}\r\n", sentence).as_bytes());
        stream.extend_from_slice(&frame_b);
        d.process(&stream);

        let (lines, frames) = buf.drain();
        assert_eq!(lines.len(), 2);
        assert_eq!(frames, vec![frame_a, frame_b]);
    }

    #[test]
    fn test_sentence_split_across_chunks() {
        let (mut d, buf) = demux();
        let sentence = nmea::with_checksum("GPGSA,A,3,04,05,09,12");
        let bytes = format!("{}\r\n", sentence);
        let (head, tail) = bytes.as_bytes().split_at(7);
        d.process(head);
        d.process(tail);

        let (lines, _) = buf.drain();
        assert_eq!(lines, vec![sentence]);
    }

    #[test]
    fn test_incomplete_frame_retained_across_many_chunks() {
        let (mut d, buf) = demux();
        let frame = build_frame(0x02, 0x15, &[7; 64]);
        // Feed one byte at a time
        for &b in &frame {
            d.process(&[b]);
        }

        let (_, frames) = buf.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], frame);
    }
}
