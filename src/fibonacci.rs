//! Fibonacci retracement and extension levels over a high/low range.

use serde::Serialize;

use crate::{Error, Result, Side, OHLCV};

pub const RETRACEMENT_RATIOS: [f64; 5] = [0.236, 0.382, 0.5, 0.618, 0.786];
pub const EXTENSION_RATIOS: [f64; 3] = [1.272, 1.618, 2.618];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibLevel {
    pub ratio: f64,
    pub price: f64,
}

/// Levels for both trend orientations of one range.
///
/// Uptrend retracements hang down from the high (`high - r * range`) and
/// extensions project above it (`high + (r - 1) * range`); downtrend levels mirror
/// from the low.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibLevels {
    pub high: f64,
    pub low: f64,
    pub uptrend_retracements: [FibLevel; 5],
    pub uptrend_extensions: [FibLevel; 3],
    pub downtrend_retracements: [FibLevel; 5],
    pub downtrend_extensions: [FibLevel; 3],
}

impl FibLevels {
    pub fn new(high: f64, low: f64) -> Result<Self> {
        // also rejects NaN
        if !(high > low) || !high.is_finite() || !low.is_finite() {
            return Err(Error::InvalidFibRange { high, low });
        }
        let range = high - low;
        let level = |ratio: f64, price: f64| FibLevel { ratio, price };

        Ok(Self {
            high,
            low,
            uptrend_retracements: RETRACEMENT_RATIOS.map(|r| level(r, high - r * range)),
            uptrend_extensions: EXTENSION_RATIOS.map(|r| level(r, high + (r - 1.0) * range)),
            downtrend_retracements: RETRACEMENT_RATIOS.map(|r| level(r, low + r * range)),
            downtrend_extensions: EXTENSION_RATIOS.map(|r| level(r, low - (r - 1.0) * range)),
        })
    }

    /// Levels over the highest high and lowest low of `candles`
    pub fn from_candles<T: OHLCV>(candles: &[T]) -> Result<Self> {
        if candles.is_empty() {
            return Err(Error::InsufficientData { need: 1, got: 0 });
        }
        let high = candles
            .iter()
            .map(|c| c.high())
            .fold(f64::NEG_INFINITY, f64::max);
        let low = candles.iter().map(|c| c.low()).fold(f64::INFINITY, f64::min);
        Self::new(high, low)
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Retracements relevant to a trade side: pullbacks from the high for longs,
    /// bounces from the low for shorts.
    pub fn retracements(&self, side: Side) -> &[FibLevel] {
        match side {
            Side::Long => &self.uptrend_retracements,
            Side::Short => &self.downtrend_retracements,
        }
    }

    pub fn extensions(&self, side: Side) -> &[FibLevel] {
        match side {
            Side::Long => &self.uptrend_extensions,
            Side::Short => &self.downtrend_extensions,
        }
    }

    /// First retracement within `tolerance` (relative) of `price`
    pub fn retracement_near(&self, side: Side, price: f64, tolerance: f64) -> Option<FibLevel> {
        self.retracements(side)
            .iter()
            .find(|l| l.price != 0.0 && ((price - l.price) / l.price).abs() < tolerance)
            .copied()
    }
}
