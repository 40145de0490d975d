//! Protocol demultiplexer for the mixed NMEA/UBX serial stream
//!
//! A u-blox style receiver interleaves two protocols on one UART:
//! - NMEA: ASCII sentences, `$`-prefixed, newline-terminated, optional
//!   `*HH` XOR checksum
//! - UBX: binary frames `[0xB5 0x62] [CLASS] [ID] [LEN_LO LEN_HI] [PAYLOAD] [CK_A CK_B]`
//!
//! The demultiplexer separates the two without interpreting payloads and
//! recovers from corruption without losing stream synchronization.

mod demux;
pub mod nmea;
pub mod ubx;

pub use demux::{DemuxStats, ProtocolDemux};

/// Max NMEA sentence length before the line is treated as noise
pub const MAX_NMEA_LINE_LEN: usize = 512;

/// Sentences at or below this length are discarded as noise
pub const MIN_NMEA_LINE_LEN: usize = 5;

/// Max UBX payload length accepted from the declared length field
pub const MAX_UBX_FRAME_LEN: usize = 2048;

/// Consecutive bad-length sync matches before a hard parser reset
pub const MAX_UBX_ERRORS_BEFORE_RESYNC: u32 = 5;
