//! Shared tolerances and window helpers for pattern detection

use crate::OHLCV;

// ============================================================
// TOLERANCES
// ============================================================

/// Absolute slack for ratio band checks, absorbs float rounding at band edges
pub const RATIO_EPSILON: f64 = 1e-9;

/// AB=CD retracement band
pub const ABCD_MIN_RETRACEMENT: f64 = 0.618;
pub const ABCD_MAX_RETRACEMENT: f64 = 0.786;

/// Gartley targets
pub const GARTLEY_B_RETRACEMENT: f64 = 0.618;
pub const GARTLEY_D_RETRACEMENT: f64 = 0.786;
pub const GARTLEY_MIN_CD_BC: f64 = 1.272;
pub const GARTLEY_MAX_CD_BC: f64 = 1.618;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// `lo <= value <= hi`, inclusive up to [`RATIO_EPSILON`]
#[inline]
pub fn in_band(value: f64, lo: f64, hi: f64) -> bool {
    value >= lo - RATIO_EPSILON && value <= hi + RATIO_EPSILON
}

/// `|value - target| <= tolerance`, inclusive up to [`RATIO_EPSILON`]
#[inline]
pub fn near(value: f64, target: f64, tolerance: f64) -> bool {
    in_band(value, target - tolerance, target + tolerance)
}

/// `|a - b| / |a|`; infinite when `a` is zero
#[inline]
pub fn relative_diff(a: f64, b: f64) -> f64 {
    if a == 0.0 {
        return f64::INFINITY;
    }
    (a - b).abs() / a.abs()
}

#[inline]
pub fn lowest_low<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min)
}

#[inline]
pub fn highest_high<T: OHLCV>(bars: &[T]) -> f64 {
    bars.iter()
        .map(|b| b.high())
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Start index of a window of `len` bars ending at `end` (inclusive), if it fits
#[inline]
pub fn window_start(end: usize, len: usize) -> Option<usize> {
    (end + 1).checked_sub(len)
}
