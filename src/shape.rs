//! Course shapes: actuator grids and the slope-effect generator.
//!
//! A shape is built from three independent slope effects. Each one is a
//! linear ramp that starts at its position threshold and reaches its
//! steepness at the far edge of its axis:
//!
//! ```text
//!   contribution
//!   steepness ┤                 ╱
//!             │               ╱
//!           0 ┼──────────────╱
//!             0        position        1   (axis fraction)
//! ```
//!
//! Contributions are summed (not averaged), scaled to degrees and clamped
//! to the actuator travel.

use crate::codec::MAX_ANGLE;
use crate::error::{Result, WireError};

/// Actuator rows on the canonical course.
pub const ROWS: usize = 9;
/// Actuator columns on the canonical course.
pub const COLS: usize = 5;
/// Total actuator count.
pub const NUM_ACTUATORS: usize = ROWS * COLS;

// ---------------------------------------------------------------------------
// ActuatorGrid
// ---------------------------------------------------------------------------

/// Rectangular grid of actuator target angles in degrees, row-major.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorGrid {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl ActuatorGrid {
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, angle: f64) -> Self {
        Self { rows, cols, cells: vec![angle; rows * cols] }
    }

    /// Canonical 9x5 grid with every actuator at rest.
    pub fn flat() -> Self {
        Self::zeroed(ROWS, COLS)
    }

    /// Build from nested rows. Every row must have the same width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(WireError::RaggedGrid { cols, row, got: bad.len() });
        }
        let n = rows.len();
        Ok(Self {
            rows: n,
            cols,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.cells[row * self.cols + col])
        } else {
            None
        }
    }

    /// Set one cell; returns false when out of bounds.
    pub fn set(&mut self, row: usize, col: usize, angle: f64) -> bool {
        if row < self.rows && col < self.cols {
            self.cells[row * self.cols + col] = angle;
            true
        } else {
            false
        }
    }

    /// Iterate rows as slices.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks(0) panics; an empty grid has no rows anyway.
        self.cells.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Cells clamped to the actuator travel and rounded to whole degrees,
    /// row-major.
    pub fn rounded_angles(&self) -> Vec<i64> {
        self.cells.iter().map(|&a| round_angle(a)).collect()
    }
}

impl Default for ActuatorGrid {
    fn default() -> Self {
        Self::flat()
    }
}

fn round_angle(angle: f64) -> i64 {
    if angle.is_nan() {
        return 0;
    }
    angle.clamp(0.0, f64::from(MAX_ANGLE)).round() as i64
}

// ---------------------------------------------------------------------------
// Slope effects
// ---------------------------------------------------------------------------

/// The three named shaping influences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlopeKind {
    LeftLean,
    RightLean,
    Uphill,
}

/// Steepness and position of one slope effect, both percentages.
///
/// Steepness 0 contributes nothing. Position is where on the axis the ramp
/// begins; 100 means the ramp never starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlopeEffect {
    steepness: f64,
    position: f64,
}

impl SlopeEffect {
    pub const NONE: SlopeEffect = SlopeEffect { steepness: 0.0, position: 0.0 };

    /// Inputs are clamped to 0..=100; NaN reads as 0.
    pub fn new(steepness: f64, position: f64) -> Self {
        Self {
            steepness: percent(steepness),
            position: percent(position),
        }
    }

    pub fn steepness(&self) -> f64 {
        self.steepness
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Ramp height at `frac` (0..=1 along the effect's axis), in 0..=1.
    pub fn ramp(&self, frac: f64) -> f64 {
        let peak = self.steepness / 100.0;
        let start = self.position / 100.0;
        let span = 1.0 - start;
        if peak <= 0.0 || span <= 0.0 || frac <= start {
            return 0.0;
        }
        peak * ((frac - start) / span).min(1.0)
    }
}

fn percent(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// All three slope effects of one course shape.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CourseShape {
    pub left_lean: SlopeEffect,
    pub right_lean: SlopeEffect,
    pub uphill: SlopeEffect,
}

impl CourseShape {
    pub fn effect(&self, kind: SlopeKind) -> SlopeEffect {
        match kind {
            SlopeKind::LeftLean => self.left_lean,
            SlopeKind::RightLean => self.right_lean,
            SlopeKind::Uphill => self.uphill,
        }
    }

    pub fn set(&mut self, kind: SlopeKind, effect: SlopeEffect) {
        match kind {
            SlopeKind::LeftLean => self.left_lean = effect,
            SlopeKind::RightLean => self.right_lean = effect,
            SlopeKind::Uphill => self.uphill = effect,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Which grid row the uphill ramp treats as the bottom of the slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowOrientation {
    /// Row 0 is the low end; the slope rises toward the last row.
    #[default]
    TopToBottom,
    /// The last row is the low end.
    BottomToTop,
}

/// Computes actuator grids from slope effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeGenerator {
    pub rows: usize,
    pub cols: usize,
    pub orientation: RowOrientation,
}

impl ShapeGenerator {
    pub fn new(rows: usize, cols: usize, orientation: RowOrientation) -> Self {
        Self { rows, cols, orientation }
    }

    /// Grid for three slope effects on a flat course.
    pub fn generate(&self, left: SlopeEffect, right: SlopeEffect, uphill: SlopeEffect) -> ActuatorGrid {
        let base = ActuatorGrid::zeroed(self.rows, self.cols);
        self.apply(&base, left, right, uphill)
    }

    /// Grid for a [`CourseShape`] on a flat course.
    pub fn generate_shape(&self, shape: &CourseShape) -> ActuatorGrid {
        self.generate(shape.left_lean, shape.right_lean, shape.uphill)
    }

    /// Add slope effects on top of a fixed base grid (e.g. a [`Preset`]).
    ///
    /// The base grid's dimensions must match the generator's.
    pub fn generate_over(
        &self,
        base: &ActuatorGrid,
        left: SlopeEffect,
        right: SlopeEffect,
        uphill: SlopeEffect,
    ) -> Result<ActuatorGrid> {
        if base.rows != self.rows || base.cols != self.cols {
            return Err(WireError::GridDimensions {
                rows: base.rows,
                cols: base.cols,
                expected_rows: self.rows,
                expected_cols: self.cols,
            });
        }
        Ok(self.apply(base, left, right, uphill))
    }

    fn apply(
        &self,
        base: &ActuatorGrid,
        left: SlopeEffect,
        right: SlopeEffect,
        uphill: SlopeEffect,
    ) -> ActuatorGrid {
        let max = f64::from(MAX_ANGLE);
        let mut grid = base.clone();
        for r in 0..self.rows {
            let row_frac = match self.orientation {
                RowOrientation::TopToBottom => axis_frac(r, self.rows),
                RowOrientation::BottomToTop => 1.0 - axis_frac(r, self.rows),
            };
            let uphill_part = uphill.ramp(row_frac);
            for c in 0..self.cols {
                let col_frac = axis_frac(c, self.cols);
                let lean = left.ramp(col_frac) + right.ramp(1.0 - col_frac);
                let idx = r * self.cols + c;
                let base_angle = if base.cells[idx].is_nan() { 0.0 } else { base.cells[idx] };
                let angle = base_angle + (lean + uphill_part) * max;
                grid.cells[idx] = angle.clamp(0.0, max);
            }
        }
        grid
    }
}

impl Default for ShapeGenerator {
    fn default() -> Self {
        Self::new(ROWS, COLS, RowOrientation::default())
    }
}

/// Canonical-size grid for three slope effects.
pub fn generate(left: SlopeEffect, right: SlopeEffect, uphill: SlopeEffect) -> ActuatorGrid {
    ShapeGenerator::default().generate(left, right, uphill)
}

/// Position of `index` along an axis of `len` cells, 0..=1. A single-cell
/// axis sits at 0.
fn axis_frac(index: usize, len: usize) -> f64 {
    if len <= 1 {
        0.0
    } else {
        index as f64 / (len - 1) as f64
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Fixed test shapes for the canonical grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Preset {
    Flat,
    /// Columns step 0, 25, 50, 75, 90 across every row.
    LeftLeaning,
    /// Columns step 90, 75, 50, 25, 0 across every row.
    RightLeaning,
    /// Rows step 10..=90 in increments of 10.
    Uphill,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Self::Flat, Self::LeftLeaning, Self::RightLeaning, Self::Uphill];

    pub fn grid(self) -> ActuatorGrid {
        const STEPS: [f64; COLS] = [0.0, 25.0, 50.0, 75.0, 90.0];
        let mut grid = ActuatorGrid::flat();
        for r in 0..ROWS {
            for c in 0..COLS {
                let angle = match self {
                    Self::Flat => 0.0,
                    Self::LeftLeaning => STEPS[c],
                    Self::RightLeaning => STEPS[COLS - 1 - c],
                    Self::Uphill => 10.0 * (r + 1) as f64,
                };
                grid.cells[r * COLS + c] = angle;
            }
        }
        grid
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn col(grid: &ActuatorGrid, c: usize) -> Vec<i64> {
        (0..grid.rows()).map(|r| grid.get(r, c).unwrap().round() as i64).collect()
    }

    #[test]
    fn flat_when_all_effects_off() {
        let grid = generate(SlopeEffect::NONE, SlopeEffect::NONE, SlopeEffect::NONE);
        assert_eq!(grid.rows(), ROWS);
        assert_eq!(grid.cols(), COLS);
        assert!(grid.rounded_angles().iter().all(|&a| a == 0));
    }

    #[test]
    fn left_lean_half_steepness_quarter_position() {
        let grid = generate(SlopeEffect::new(50.0, 25.0), SlopeEffect::NONE, SlopeEffect::NONE);
        // colFrac 0.0, 0.25 are at or below the threshold.
        assert!(col(&grid, 0).iter().all(|&a| a == 0));
        assert!(col(&grid, 1).iter().all(|&a| a == 0));
        // Strictly increasing beyond it, peaking at 45 degrees.
        assert!(col(&grid, 2).iter().all(|&a| a == 15));
        assert!(col(&grid, 3).iter().all(|&a| a == 30));
        assert!(col(&grid, 4).iter().all(|&a| a == 45));
        for r in 0..ROWS {
            let row: Vec<f64> = (1..COLS).map(|c| grid.get(r, c).unwrap()).collect();
            assert!(row.windows(2).all(|w| w[0] < w[1]), "row {r} not increasing: {row:?}");
        }
    }

    #[test]
    fn right_lean_mirrors_left_lean() {
        let left = generate(SlopeEffect::new(80.0, 10.0), SlopeEffect::NONE, SlopeEffect::NONE);
        let right = generate(SlopeEffect::NONE, SlopeEffect::new(80.0, 10.0), SlopeEffect::NONE);
        for r in 0..ROWS {
            for c in 0..COLS {
                assert_eq!(left.get(r, c), right.get(r, COLS - 1 - c));
            }
        }
    }

    #[test]
    fn uphill_ramps_along_rows() {
        let grid = generate(SlopeEffect::NONE, SlopeEffect::NONE, SlopeEffect::new(100.0, 0.0));
        assert_eq!(grid.get(0, 2), Some(0.0));
        assert_eq!(grid.get(ROWS - 1, 2), Some(90.0));
        assert_eq!(grid.get(4, 0), Some(45.0));

        let reversed = ShapeGenerator::new(ROWS, COLS, RowOrientation::BottomToTop).generate(
            SlopeEffect::NONE,
            SlopeEffect::NONE,
            SlopeEffect::new(100.0, 0.0),
        );
        assert_eq!(reversed.get(0, 2), Some(90.0));
        assert_eq!(reversed.get(ROWS - 1, 2), Some(0.0));
    }

    #[test]
    fn effects_sum_then_clamp() {
        let grid = generate(
            SlopeEffect::new(100.0, 0.0),
            SlopeEffect::NONE,
            SlopeEffect::new(100.0, 0.0),
        );
        // Far corner: 90 + 90, clamped.
        assert_eq!(grid.get(ROWS - 1, COLS - 1), Some(90.0));
        // Both halves contribute 45 each.
        assert_eq!(grid.get(4, 2), Some(90.0));
        assert!(grid.rounded_angles().iter().all(|&a| (0..=90).contains(&a)));
    }

    #[test]
    fn position_zero_spans_whole_axis() {
        let grid = generate(SlopeEffect::new(100.0, 0.0), SlopeEffect::NONE, SlopeEffect::NONE);
        assert_eq!(col(&grid, 0), vec![0; ROWS]);
        assert_eq!(col(&grid, 1), vec![23; ROWS]); // 22.5 rounds up
        assert_eq!(col(&grid, 4), vec![90; ROWS]);
    }

    #[test]
    fn position_hundred_never_activates() {
        let full = SlopeEffect::new(100.0, 100.0);
        let grid = generate(full, full, full);
        assert!(grid.rounded_angles().iter().all(|&a| a == 0));
        assert_eq!(full.ramp(1.0), 0.0);
    }

    #[test]
    fn zero_steepness_contributes_nothing() {
        let grid = generate(SlopeEffect::new(0.0, 0.0), SlopeEffect::new(0.0, 50.0), SlopeEffect::NONE);
        assert!(grid.rounded_angles().iter().all(|&a| a == 0));
    }

    #[test]
    fn deterministic() {
        let a = generate(SlopeEffect::new(33.0, 12.0), SlopeEffect::new(71.0, 40.0), SlopeEffect::new(55.0, 5.0));
        let b = generate(SlopeEffect::new(33.0, 12.0), SlopeEffect::new(71.0, 40.0), SlopeEffect::new(55.0, 5.0));
        assert_eq!(a, b);
        assert_eq!(a.rounded_angles(), b.rounded_angles());
    }

    #[test]
    fn slope_inputs_are_sanitized() {
        let e = SlopeEffect::new(f64::NAN, 250.0);
        assert_eq!(e.steepness(), 0.0);
        assert_eq!(e.position(), 100.0);
        let e = SlopeEffect::new(-5.0, -1.0);
        assert_eq!(e.steepness(), 0.0);
        assert_eq!(e.position(), 0.0);
    }

    #[test]
    fn generate_over_preset() {
        let generator = ShapeGenerator::default();
        let grid = generator
            .generate_over(&Preset::Uphill.grid(), SlopeEffect::NONE, SlopeEffect::new(100.0, 0.0), SlopeEffect::NONE)
            .unwrap();
        // Column 0 gets the full right-lean ramp on top of the row step.
        assert_eq!(grid.get(0, 0), Some(90.0));
        assert_eq!(grid.get(0, 4), Some(10.0));

        let wrong = ActuatorGrid::zeroed(3, 5);
        assert!(matches!(
            generator.generate_over(&wrong, SlopeEffect::NONE, SlopeEffect::NONE, SlopeEffect::NONE),
            Err(WireError::GridDimensions { rows: 3, .. })
        ));
    }

    #[test]
    fn generate_over_nan_base_reads_as_flat() {
        let mut base = ActuatorGrid::flat();
        base.set(0, 0, f64::NAN);
        base.set(1, 2, f64::NAN);
        let grid = ShapeGenerator::default()
            .generate_over(&base, SlopeEffect::new(100.0, 0.0), SlopeEffect::NONE, SlopeEffect::NONE)
            .unwrap();
        assert!(grid.iter_rows().flatten().all(|a| !a.is_nan()));
        assert_eq!(grid.get(0, 0), Some(0.0));
        assert_eq!(grid.get(1, 2), Some(45.0));
    }

    #[test]
    fn course_shape_accessors() {
        let mut shape = CourseShape::default();
        shape.set(SlopeKind::Uphill, SlopeEffect::new(40.0, 0.0));
        assert_eq!(shape.effect(SlopeKind::Uphill).steepness(), 40.0);
        assert_eq!(shape.effect(SlopeKind::LeftLean), SlopeEffect::NONE);
        let grid = ShapeGenerator::default().generate_shape(&shape);
        assert_eq!(grid.get(ROWS - 1, 0).map(f64::round), Some(36.0));
    }

    #[test]
    fn presets() {
        let left = Preset::LeftLeaning.grid();
        assert_eq!(left.iter_rows().next().unwrap(), &[0.0, 25.0, 50.0, 75.0, 90.0]);
        let right = Preset::RightLeaning.grid();
        assert_eq!(right.iter_rows().last().unwrap(), &[90.0, 75.0, 50.0, 25.0, 0.0]);
        let up = Preset::Uphill.grid();
        assert_eq!(col(&up, 3), vec![10, 20, 30, 40, 50, 60, 70, 80, 90]);
        assert_eq!(Preset::Flat.grid(), ActuatorGrid::flat());
    }

    #[test]
    fn grid_construction() {
        let grid = ActuatorGrid::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!((grid.rows(), grid.cols()), (2, 2));
        assert_eq!(grid.get(1, 0), Some(3.0));
        assert_eq!(grid.get(2, 0), None);

        assert!(matches!(
            ActuatorGrid::from_rows(vec![vec![1.0, 2.0], vec![3.0]]),
            Err(WireError::RaggedGrid { cols: 2, row: 1, got: 1 })
        ));

        let mut grid = ActuatorGrid::flat();
        assert!(grid.set(8, 4, 120.0));
        assert!(!grid.set(9, 0, 1.0));
        assert_eq!(grid.rounded_angles()[44], 90);
    }
}
