//! Commands and telemetry for the course controller.
//!
//! - [`Command`]: one-shot writes we POST to the controller
//! - [`telemetry`]: decoders for the polled GET resources
//! - [`course`]: the `course_state` payload encoder

pub mod course;
pub mod telemetry;

use std::fmt;

use crate::addr::Resource;
use crate::codec;
use crate::error::Result;
use crate::mode::BallDispensingMode;

pub use course::{CourseState, PayloadOptions, build_course_state_payload};
pub use telemetry::{ErrorCodes, FaultCode, Stats};

// ---------------------------------------------------------------------------
// Command: requests we send to the controller
// ---------------------------------------------------------------------------

/// A write to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Mode byte + actuator grid.
    CourseState(CourseState),
    /// Zero the ball counters.
    ResetStats,
    /// Dispense 0..=10 balls.
    DispenseBall(u32),
    /// Ball dispensing behavior.
    Settings(BallDispensingMode),
    /// Legacy ball-return trigger (empty body). Current firmware uses the
    /// `BallReturn` course mode instead.
    ClearSequence,
}

/// Command type, without payload. Used to serialize writes of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CourseState,
    ResetStats,
    DispenseBall,
    Settings,
    ClearSequence,
}

impl CommandKind {
    pub const ALL: [CommandKind; 5] = [
        Self::CourseState,
        Self::ResetStats,
        Self::DispenseBall,
        Self::Settings,
        Self::ClearSequence,
    ];

    /// Dense index for per-kind bookkeeping tables.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::CourseState => 0,
            Self::ResetStats => 1,
            Self::DispenseBall => 2,
            Self::Settings => 3,
            Self::ClearSequence => 4,
        }
    }

    pub fn resource(self) -> Resource {
        match self {
            Self::CourseState => Resource::CourseState,
            Self::ResetStats => Resource::ResetStats,
            Self::DispenseBall => Resource::DispenseBall,
            Self::Settings => Resource::Settings,
            Self::ClearSequence => Resource::ClearSequence,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource().path())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CourseState(_) => CommandKind::CourseState,
            Command::ResetStats => CommandKind::ResetStats,
            Command::DispenseBall(_) => CommandKind::DispenseBall,
            Command::Settings(_) => CommandKind::Settings,
            Command::ClearSequence => CommandKind::ClearSequence,
        }
    }

    pub fn resource(&self) -> Resource {
        self.kind().resource()
    }

    /// Encode the request body. Validation failures mean nothing is sent.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Command::CourseState(state) => state.encode(),
            Command::ResetStats | Command::ClearSequence => Ok(Vec::new()),
            Command::DispenseBall(count) => Ok(vec![codec::encode_dispense_count(*count)?]),
            Command::Settings(mode) => Ok(vec![codec::encode_dispensing_mode(*mode)]),
        }
    }

    /// Format as a hex debug line: `"POST /settings 1B | 00"`.
    pub fn debug_hex(&self) -> String {
        let resource = self.resource();
        let body = match self.encode() {
            Ok(body) => body,
            Err(e) => return format!("{} {resource} <{e}>", resource.method()),
        };
        let mut s = format!("{} {resource} {}B", resource.method(), body.len());
        if !body.is_empty() {
            s.push_str(" | ");
            let limit = 20;
            for b in body.iter().take(limit) {
                s.push_str(&format!("{b:02X}"));
            }
            if body.len() > limit {
                s.push_str("...");
            }
        }
        s
    }
}
