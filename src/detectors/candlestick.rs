//! Simple candlestick heuristics: Hammer, Morning Star, Piercing Line,
//! Three White Soldiers
//!
//! All are bullish. The stop sits at the lowest low of the candles forming the
//! pattern.

#![allow(clippy::default_constructed_unit_structs)]

use super::helpers::lowest_low;
use crate::{
    swing::Swings, CandlestickKind, Error, OHLCVExt, Pattern, PatternDetector, PatternId,
    Ratio, Result, OHLCV,
};

impl_with_defaults!(
    HammerDetector,
    MorningStarDetector,
    PiercingLineDetector,
    ThreeWhiteSoldiersDetector,
);

fn candlestick<T: OHLCV>(kind: CandlestickKind, bars: &[T], start: usize, index: usize) -> Pattern {
    Pattern::Candlestick {
        kind,
        start_index: start,
        index,
        stop_loss: lowest_low(&bars[start..=index]),
    }
}

fn scan_indices<T, F>(bars: &[T], span: usize, at: F) -> Vec<Pattern>
where
    T: OHLCV,
    F: Fn(usize) -> Option<Pattern>,
{
    (span.saturating_sub(1)..bars.len()).filter_map(at).collect()
}

// ============================================================
// HAMMER
// ============================================================

/// Long lower wick, short upper wick
#[derive(Debug, Clone)]
pub struct HammerDetector {
    /// Lower wick must exceed this multiple of the body
    pub lower_wick_body_factor: f64,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            lower_wick_body_factor: 2.0,
        }
    }
}

impl HammerDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        let bar = bars.get(index)?;
        let body = bar.body();
        (bar.lower_shadow() > self.lower_wick_body_factor * body && bar.upper_shadow() < body)
            .then(|| candlestick(CandlestickKind::Hammer, bars, index, index))
    }
}

impl PatternDetector for HammerDetector {
    fn id(&self) -> PatternId {
        PatternId("HAMMER")
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        scan_indices(candles, 1, |i| self.detect_at(candles, i))
    }

    fn validate_config(&self) -> Result<()> {
        if !(self.lower_wick_body_factor.is_finite() && self.lower_wick_body_factor > 0.0) {
            return Err(Error::InvalidConfig(
                "hammer lower_wick_body_factor must be positive".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// MORNING STAR
// ============================================================

/// Bearish candle, small-bodied star, bullish candle closing above the first
/// candle's body midpoint
#[derive(Debug, Clone)]
pub struct MorningStarDetector {
    /// Star body must be below this fraction of its range
    pub star_body_max_ratio: Ratio,
}

impl Default for MorningStarDetector {
    fn default() -> Self {
        Self {
            star_body_max_ratio: Ratio::new_const(0.3),
        }
    }
}

impl MorningStarDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        if index < 2 {
            return None;
        }
        let (c1, c2, c3) = (bars.get(index - 2)?, bars.get(index - 1)?, bars.get(index)?);

        let small_star = c2.body() < self.star_body_max_ratio.get() * c2.range();
        (c1.is_bearish() && small_star && c3.is_bullish() && c3.close() > c1.body_midpoint())
            .then(|| candlestick(CandlestickKind::MorningStar, bars, index - 2, index))
    }
}

impl PatternDetector for MorningStarDetector {
    fn id(&self) -> PatternId {
        PatternId("MORNING_STAR")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        scan_indices(candles, 3, |i| self.detect_at(candles, i))
    }
}

// ============================================================
// PIERCING LINE
// ============================================================

/// Bullish candle opening below the prior bearish candle's low and closing
/// into the upper half of its body
#[derive(Debug, Clone, Default)]
pub struct PiercingLineDetector;

impl PiercingLineDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        if index < 1 {
            return None;
        }
        let (c1, c2) = (bars.get(index - 1)?, bars.get(index)?);

        (c1.is_bearish()
            && c2.is_bullish()
            && c2.open() < c1.low()
            && c2.close() > c1.body_midpoint()
            && c2.close() < c1.open())
        .then(|| candlestick(CandlestickKind::PiercingLine, bars, index - 1, index))
    }
}

impl PatternDetector for PiercingLineDetector {
    fn id(&self) -> PatternId {
        PatternId("PIERCING_LINE")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        scan_indices(candles, 2, |i| self.detect_at(candles, i))
    }
}

// ============================================================
// THREE WHITE SOLDIERS
// ============================================================

/// Three rising bullish candles, each opening inside the previous body
#[derive(Debug, Clone, Default)]
pub struct ThreeWhiteSoldiersDetector;

impl ThreeWhiteSoldiersDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        if index < 2 {
            return None;
        }
        let (c1, c2, c3) = (bars.get(index - 2)?, bars.get(index - 1)?, bars.get(index)?);

        let all_bullish = c1.is_bullish() && c2.is_bullish() && c3.is_bullish();
        let opens_inside = |prev: &T, curr: &T| prev.open() < curr.open() && curr.open() < prev.close();
        let rising = c3.close() > c2.close() && c2.close() > c1.close();

        (all_bullish && opens_inside(c1, c2) && opens_inside(c2, c3) && rising)
            .then(|| candlestick(CandlestickKind::ThreeWhiteSoldiers, bars, index - 2, index))
    }
}

impl PatternDetector for ThreeWhiteSoldiersDetector {
    fn id(&self) -> PatternId {
        PatternId("THREE_WHITE_SOLDIERS")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        scan_indices(candles, 3, |i| self.detect_at(candles, i))
    }
}
