use thiserror::Error;

/// Errors arising from payload encoding, telemetry decoding, and HTTP framing.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("actuator angle {angle} outside 0..=90")]
    AngleOutOfRange { angle: i64 },

    #[error("angle byte 0x{byte:02X} is not a valid wire value")]
    NonAsciiByte { byte: u8 },

    #[error("dispense count {count} outside 0..=10")]
    DispenseOutOfRange { count: u32 },

    #[error("unknown course mode byte 0x{byte:02X}")]
    UnknownMode { byte: u8 },

    #[error("unknown dispensing mode byte 0x{byte:02X}")]
    UnknownDispensingMode { byte: u8 },

    #[error("grid is {rows}x{cols}, controller expects {expected_rows}x{expected_cols}")]
    GridDimensions {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("grid rows are not all {cols} cells wide (row {row} has {got})")]
    RaggedGrid { cols: usize, row: usize, got: usize },

    #[error("course payload is {got} bytes, expected {expected}")]
    PayloadLength { expected: usize, got: usize },

    #[error("empty {msg_type} payload")]
    EmptyPayload { msg_type: &'static str },

    #[error("unexpected payload length for {msg_type}: expected {expected}, got {got}{}", format_raw_suffix(raw))]
    UnexpectedLength {
        msg_type: &'static str,
        expected: usize,
        got: usize,
        /// Raw response bytes for debug context.
        raw: Vec<u8>,
    },

    #[error("stats invariant violated: {balls_in_hole} in hole but only {balls_hit} hit")]
    StatsInvariant { balls_hit: u32, balls_in_hole: u32 },

    #[error("invalid string payload: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    #[error("malformed HTTP response: {reason}{}", format_raw_suffix(raw))]
    MalformedResponse {
        reason: &'static str,
        /// Leading response bytes for debug context.
        raw: Vec<u8>,
    },
}

impl WireError {
    /// Create an `UnexpectedLength` error (raw bytes filled in later via `with_raw`).
    pub(crate) fn unexpected_length(msg_type: &'static str, expected: usize, got: usize) -> Self {
        Self::UnexpectedLength { msg_type, expected, got, raw: Vec::new() }
    }

    pub(crate) fn malformed(reason: &'static str) -> Self {
        Self::MalformedResponse { reason, raw: Vec::new() }
    }

    /// Attach raw bytes to decode-phase errors for diagnostics.
    pub fn with_raw(self, payload: &[u8]) -> Self {
        match self {
            Self::UnexpectedLength { msg_type, expected, got, .. } => {
                Self::UnexpectedLength { msg_type, expected, got, raw: payload.to_vec() }
            }
            Self::MalformedResponse { reason, .. } => {
                Self::MalformedResponse { reason, raw: payload.to_vec() }
            }
            other => other,
        }
    }
}

/// Format raw bytes as a suffix like " | 33 32 ..." (empty if no bytes).
fn format_raw_suffix(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let limit = 16;
    let hex: String = raw.iter().take(limit).map(|b| format!("{b:02X}")).collect();
    let ellipsis = if raw.len() > limit { "..." } else { "" };
    format!(" | {hex}{ellipsis}")
}

pub type Result<T> = std::result::Result<T, WireError>;
