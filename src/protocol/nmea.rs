//! NMEA sentence checksum validation
//!
//! The checksum is a single-byte XOR over the characters between `$` and
//! `*`, expressed as two hex digits after the `*`. Validation is
//! deliberately lenient: a sentence with no `*` at all passes, and only the
//! first two characters after `*` are inspected.

/// XOR checksum over a sentence body (the part between `$` and `*`)
pub fn xor_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Validate the optional trailing checksum of an NMEA sentence
///
/// Returns true if the sentence has no checksum field, or if the provided
/// hex value matches the computed XOR. A sentence with more than one `*`
/// is rejected.
pub fn validate_checksum(line: &str) -> bool {
    let mut parts = line.split('*');
    let sentence = parts.next().unwrap_or("");
    let Some(checksum) = parts.next() else {
        return true; // No checksum to validate
    };
    if parts.next().is_some() {
        return false; // More than one '*'
    }

    let body = sentence.trim_start_matches('$');
    let hex = &checksum[..checksum.len().min(2)];
    let Ok(provided) = u8::from_str_radix(hex, 16) else {
        return false;
    };

    xor_checksum(body) == provided
}

/// Append the canonical `*HH` checksum field to a sentence body
///
/// Test helper for building valid sentences; `body` excludes the leading `$`.
pub fn with_checksum(body: &str) -> String {
    format!("${}*{:02X}", body, xor_checksum(body))
}
