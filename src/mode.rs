use std::fmt;

use crate::error::{Result, WireError};

/// Operating behavior of the whole actuator grid. Sent as the first byte of
/// every `course_state` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CourseMode {
    /// Hold the commanded tilt.
    #[default]
    Static = 0x00,
    /// Run the ball-return sequence (tilt the course toward the collector).
    BallReturn = 0x01,
    /// Animated rolling wave.
    Wave = 0x02,
    /// Animated full-amplitude wave.
    Tsunami = 0x03,
}

impl CourseMode {
    pub const ALL: [CourseMode; 4] = [Self::Static, Self::BallReturn, Self::Wave, Self::Tsunami];

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(Self::Static),
            0x01 => Ok(Self::BallReturn),
            0x02 => Ok(Self::Wave),
            0x03 => Ok(Self::Tsunami),
            _ => Err(WireError::UnknownMode { byte: b }),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Static => 0x00,
            Self::BallReturn => 0x01,
            Self::Wave => 0x02,
            Self::Tsunami => 0x03,
        }
    }
}

impl fmt::Display for CourseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "STATIC"),
            Self::BallReturn => write!(f, "BALL_RETURN"),
            Self::Wave => write!(f, "WAVE"),
            Self::Tsunami => write!(f, "TSUNAMI"),
        }
    }
}

/// Ball dispenser behavior, sent to the `settings` resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum BallDispensingMode {
    /// Dispense only on explicit `dispense_ball` requests.
    #[default]
    Manual = 0x00,
    /// Dispense a new ball whenever the previous one is resolved.
    Automatic = 0x01,
}

impl BallDispensingMode {
    pub const ALL: [BallDispensingMode; 2] = [Self::Manual, Self::Automatic];

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x00 => Ok(Self::Manual),
            0x01 => Ok(Self::Automatic),
            _ => Err(WireError::UnknownDispensingMode { byte: b }),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Manual => 0x00,
            Self::Automatic => 0x01,
        }
    }
}

impl fmt::Display for BallDispensingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "MANUAL"),
            Self::Automatic => write!(f, "AUTOMATIC"),
        }
    }
}
