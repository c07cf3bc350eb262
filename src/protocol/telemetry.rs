//! Telemetry responses: stats counters, error codes, and debug text.
//!
//! `stats` and `error_codes` bodies are ASCII digit strings, one digit per
//! value. Bytes that are not digits are dropped rather than rejected.

use std::fmt;

use crate::codec;
use crate::error::{Result, WireError};

/// Ball counters reported by `stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    pub balls_hit: u32,
    pub balls_in_hole: u32,
}

impl Stats {
    /// A ball can't reach the hole without being hit, so
    /// `balls_in_hole > balls_hit` means corrupt telemetry.
    pub fn validate(&self) -> Result<()> {
        if self.balls_in_hole > self.balls_hit {
            return Err(WireError::StatsInvariant {
                balls_hit: self.balls_hit,
                balls_in_hole: self.balls_in_hole,
            });
        }
        Ok(())
    }

    /// Fraction of hit balls that went in, 0.0 when nothing has been hit.
    pub fn accuracy(&self) -> f64 {
        if self.balls_hit == 0 {
            0.0
        } else {
            f64::from(self.balls_in_hole) / f64::from(self.balls_hit)
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.0}%)",
            self.balls_in_hole,
            self.balls_hit,
            self.accuracy() * 100.0
        )
    }
}

/// Firmware fault table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaultCode {
    /// Ball counting arithmetic went inconsistent.
    BallMath,
    /// Ball-in-hole feed jammed.
    BallInHoleFeed,
    /// Ball return to the player failed.
    PlayerBallReturn,
    /// Non-volatile storage read/write failed.
    Nvs,
}

impl FaultCode {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::BallMath),
            1 => Some(Self::BallInHoleFeed),
            2 => Some(Self::PlayerBallReturn),
            3 => Some(Self::Nvs),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::BallMath => 0,
            Self::BallInHoleFeed => 1,
            Self::PlayerBallReturn => 2,
            Self::Nvs => 3,
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BallMath => write!(f, "BALL_MATH"),
            Self::BallInHoleFeed => write!(f, "BALL_IN_HOLE_FEED"),
            Self::PlayerBallReturn => write!(f, "PLAYER_BALL_RETURN"),
            Self::Nvs => write!(f, "NVS"),
        }
    }
}

/// Ordered error codes reported by `error_codes`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorCodes(pub Vec<u8>);

impl ErrorCodes {
    pub fn codes(&self) -> &[u8] {
        &self.0
    }

    /// Known faults in report order. Unknown codes are skipped.
    pub fn faults(&self) -> Vec<FaultCode> {
        self.0.iter().copied().filter_map(FaultCode::from_code).collect()
    }
}

impl fmt::Display for ErrorCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{code}")?;
        }
        Ok(())
    }
}

/// Decode a `stats` body: exactly two digits, balls hit then balls in hole.
pub fn decode_stats(data: &[u8]) -> Result<Stats> {
    if data.is_empty() {
        return Err(WireError::EmptyPayload { msg_type: "Stats" });
    }
    let digits = codec::decode_digits(data);
    if digits.len() != 2 {
        return Err(WireError::unexpected_length("Stats", 2, digits.len()).with_raw(data));
    }
    Ok(Stats {
        balls_hit: u32::from(digits[0]),
        balls_in_hole: u32::from(digits[1]),
    })
}

/// Decode an `error_codes` body.
pub fn decode_error_codes(data: &[u8]) -> Result<ErrorCodes> {
    if data.is_empty() {
        return Err(WireError::EmptyPayload { msg_type: "ErrorCodes" });
    }
    Ok(ErrorCodes(codec::decode_digits(data)))
}

/// Decode a `debug_msg` body as strict UTF-8.
pub fn decode_debug_message(data: &[u8]) -> Result<String> {
    Ok(String::from_utf8(data.to_vec())?)
}
