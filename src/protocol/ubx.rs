//! UBX frame layout and checksum
//!
//! Frame format: `[0xB5 0x62] [CLASS] [ID] [LEN_LO LEN_HI] [PAYLOAD] [CK_A CK_B]`
//!
//! The length field is a little-endian u16 counting payload bytes only.
//! The checksum is the 8-bit Fletcher pair computed over CLASS, ID, LENGTH
//! and PAYLOAD (everything between the sync bytes and the checksum itself).

/// Sync byte 1
pub const SYNC1: u8 = 0xB5;
/// Sync byte 2
pub const SYNC2: u8 = 0x62;

/// Fixed bytes around the payload: sync(2) + class(1) + id(1) + length(2)
pub const HEADER_LEN: usize = 6;
/// Trailing checksum pair
pub const CHECKSUM_LEN: usize = 2;
/// Smallest complete frame (empty payload)
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

/// Running-sum checksum pair over `data`
///
/// `ck_a += byte; ck_b += ck_a`, both wrapping at 256.
pub fn checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// Declared payload length of a staged frame (needs at least 6 bytes)
pub fn payload_len(frame: &[u8]) -> Option<usize> {
    if frame.len() < HEADER_LEN {
        return None;
    }
    Some(u16::from_le_bytes([frame[4], frame[5]]) as usize)
}

/// Verify the trailing checksum pair of a complete frame
pub fn validate_frame(frame: &[u8]) -> bool {
    if frame.len() < MIN_FRAME_LEN {
        return false;
    }
    let (ck_a, ck_b) = checksum(&frame[2..frame.len() - 2]);
    frame[frame.len() - 2] == ck_a && frame[frame.len() - 1] == ck_b
}

/// Build a complete frame from class, id and payload
///
/// Test helper; the relay itself never constructs frames.
pub fn build_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut frame = Vec::with_capacity(MIN_FRAME_LEN + payload.len());
    frame.push(SYNC1);
    frame.push(SYNC2);
    frame.push(class);
    frame.push(id);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    let (ck_a, ck_b) = checksum(&frame[2..]);
    frame.push(ck_a);
    frame.push(ck_b);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_running_sum() {
        // Worked example over [0x0A, 0x09, 0x02, 0x00, 0xAA, 0xBB]:
        // ck_a = 0A, 13, 15, 15, BF, 7A
        // ck_b = 0A, 1D, 32, 47, 06, 80
        let (ck_a, ck_b) = checksum(&[0x0A, 0x09, 0x02, 0x00, 0xAA, 0xBB]);
        assert_eq!(ck_a, 0x7A);
        assert_eq!(ck_b, 0x80);
    }

    #[test]
    fn test_build_and_validate_frame() {
        let frame = build_frame(0x0A, 0x09, &[0xAA, 0xBB]);
        assert_eq!(frame.len(), 10);
        assert_eq!(&frame[..2], &[SYNC1, SYNC2]);
        assert_eq!(payload_len(&frame), Some(2));
        assert!(validate_frame(&frame));
    }

    #[test]
    fn test_corrupted_frame_fails_validation() {
        let mut frame = build_frame(0x01, 0x07, &[1, 2, 3, 4]);
        frame[7] ^= 0xFF;
        assert!(!validate_frame(&frame));
    }

    #[test]
    fn test_truncated_frame_fails_validation() {
        let frame = build_frame(0x01, 0x07, &[]);
        assert!(!validate_frame(&frame[..frame.len() - 1]));
    }
}
