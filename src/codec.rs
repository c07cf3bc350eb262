//! Single-byte field codecs for the controller protocol.
//!
//! Every command field is one raw byte. Actuator angles use an inverted
//! scale (`90 - angle`); telemetry responses are streams of ASCII digits.

use crate::error::{Result, WireError};
use crate::mode::{BallDispensingMode, CourseMode};

/// Full actuator travel in degrees.
pub const MAX_ANGLE: u8 = 90;

/// Largest ball count accepted by `dispense_ball`.
pub const MAX_DISPENSE: u8 = 10;

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encode a course mode to its fixed wire byte.
pub fn encode_mode(mode: CourseMode) -> u8 {
    mode.as_byte()
}

/// Encode a dispensing mode to its fixed wire byte.
pub fn encode_dispensing_mode(mode: BallDispensingMode) -> u8 {
    mode.as_byte()
}

/// Encode an actuator angle (degrees, 0..=90) as `90 - angle`.
///
/// The firmware applies the same inverse, so this mapping is part of the
/// wire contract.
pub fn encode_angle(angle: i64) -> Result<u8> {
    if !(0..=i64::from(MAX_ANGLE)).contains(&angle) {
        return Err(WireError::AngleOutOfRange { angle });
    }
    let byte = MAX_ANGLE - angle as u8;
    if !byte.is_ascii() {
        return Err(WireError::NonAsciiByte { byte });
    }
    Ok(byte)
}

/// Encode a dispense request count (0..=10) as a raw byte.
pub fn encode_dispense_count(count: u32) -> Result<u8> {
    if count > u32::from(MAX_DISPENSE) {
        return Err(WireError::DispenseOutOfRange { count });
    }
    Ok(count as u8)
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Raw integer value of a wire byte.
pub fn decode_byte(byte: u8) -> u32 {
    u32::from(byte)
}

/// Invert [`encode_angle`]: wire byte back to degrees.
pub fn decode_angle(byte: u8) -> Result<u8> {
    if byte > MAX_ANGLE {
        return Err(WireError::NonAsciiByte { byte });
    }
    Ok(MAX_ANGLE - byte)
}

/// Decode one telemetry byte as an ASCII decimal digit.
pub fn decode_digit(byte: u8) -> Option<u8> {
    byte.is_ascii_digit().then(|| byte - b'0')
}

/// Decode a telemetry buffer into its digit sequence, dropping non-digits.
pub fn decode_digits(data: &[u8]) -> Vec<u8> {
    data.iter().copied().filter_map(decode_digit).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
