//! Client configuration.

use std::time::Duration;

use crate::addr::DEFAULT_ADDR;
use crate::conn::DEFAULT_TIMEOUT;
use crate::protocol::PayloadOptions;
use crate::shape::RowOrientation;

/// Poll cadence per telemetry stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PollConfig {
    pub stats_interval: Duration,
    pub error_codes_interval: Duration,
    pub debug_interval: Duration,
    /// Treat `balls_in_hole > balls_hit` as a failed poll.
    pub validate_stats: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            error_codes_interval: Duration::from_secs(1),
            debug_interval: Duration::from_millis(500),
            validate_stats: true,
        }
    }
}

/// Everything a [`Session`](crate::session::Session) needs to talk to one
/// controller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    /// Controller host or `host:port`.
    pub address: String,
    /// Per-request bound for connect, write and read.
    pub request_timeout: Duration,
    pub poll: PollConfig,
    pub payload: PayloadOptions,
    pub orientation: RowOrientation,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDR.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            poll: PollConfig::default(),
            payload: PayloadOptions::default(),
            orientation: RowOrientation::default(),
        }
    }
}

#[cfg(feature = "json")]
impl ClientConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
