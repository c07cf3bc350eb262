//! `course_state` payload: one mode byte followed by one angle byte per
//! actuator.
//!
//! ```text
//! [MODE] [A(8,0) .. A(8,4)] [A(7,0) .. A(7,4)] ... [A(0,0) .. A(0,4)]
//! ```
//!
//! Grid rows go out last-first (mirrored) to match how actuator rows are
//! wired to firmware indices. Each angle byte is `90 - angle`.

use crate::codec;
use crate::error::{Result, WireError};
use crate::mode::CourseMode;
use crate::shape::{ActuatorGrid, COLS, NUM_ACTUATORS, ROWS};

/// Bytes in a canonical `course_state` payload.
pub const PAYLOAD_LEN: usize = 1 + NUM_ACTUATORS;

/// Per-row divisors applied to the first transmitted rows when easing.
/// Rows past the end of this table are sent at full amplitude.
const EASING_DIVISORS: [i64; 2] = [3, 2];

/// Transmission options for a course payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PayloadOptions {
    /// Send the last grid row first.
    pub mirror_rows: bool,
    /// Damp the first two transmitted rows (divide by 3 and 2) so a course
    /// coming out of rest doesn't slam to full amplitude.
    pub easing: bool,
}

impl PayloadOptions {
    /// Full amplitude on every row.
    pub const MAX: PayloadOptions = PayloadOptions { mirror_rows: true, easing: false };
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self { mirror_rows: true, easing: true }
    }
}

/// A complete course command: mode plus target grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseState {
    pub mode: CourseMode,
    pub grid: ActuatorGrid,
    pub options: PayloadOptions,
}

impl CourseState {
    pub fn new(mode: CourseMode, grid: ActuatorGrid) -> Self {
        Self { mode, grid, options: PayloadOptions::default() }
    }

    /// All actuators at rest in static mode.
    pub fn rest() -> Self {
        Self::new(CourseMode::Static, ActuatorGrid::flat())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        build_course_state_payload(self.mode, &self.grid, self.options)
    }
}

/// Build the exact byte payload for `course_state`.
///
/// Fails without producing any bytes if the grid is not the canonical size
/// or any cell fails to encode.
pub fn build_course_state_payload(
    mode: CourseMode,
    grid: &ActuatorGrid,
    options: PayloadOptions,
) -> Result<Vec<u8>> {
    if grid.rows() != ROWS || grid.cols() != COLS {
        return Err(WireError::GridDimensions {
            rows: grid.rows(),
            cols: grid.cols(),
            expected_rows: ROWS,
            expected_cols: COLS,
        });
    }

    let angles = grid.rounded_angles();
    let mut rows: Vec<&[i64]> = angles.chunks(COLS).collect();
    if options.mirror_rows {
        rows.reverse();
    }

    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.push(codec::encode_mode(mode));
    for (tx_row, row) in rows.iter().enumerate() {
        let divisor = if options.easing {
            EASING_DIVISORS.get(tx_row).copied().unwrap_or(1)
        } else {
            1
        };
        for &angle in row.iter() {
            payload.push(codec::encode_angle(angle / divisor)?);
        }
    }

    if payload.len() != PAYLOAD_LEN {
        return Err(WireError::PayloadLength { expected: PAYLOAD_LEN, got: payload.len() });
    }
    Ok(payload)
}
