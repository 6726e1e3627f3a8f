//! Window-based chart heuristics
//!
//! Each detector looks at a fixed trailing window ending at a candidate index
//! and fires on the breakout candle. All are bullish.

use super::helpers::{highest_high, lowest_low, relative_diff, window_start};
use crate::{
    swing::Swings, ChartKind, OHLCVExt, Pattern, PatternDetector, PatternId, Period, Ratio,
    OHLCV,
};

impl_with_defaults!(
    CupAndHandleDetector,
    InverseHeadAndShouldersDetector,
    FallingWedgeDetector,
    BullFlagDetector,
    AscendingTriangleDetector,
);

fn chart(kind: ChartKind, start_index: usize, index: usize, stop_loss: f64) -> Pattern {
    Pattern::Chart {
        kind,
        start_index,
        index,
        stop_loss,
    }
}

// ============================================================
// CUP AND HANDLE
// ============================================================

/// Rounded cup between two similar rims, a shallow handle, then a close above
/// the rim.
#[derive(Debug, Clone)]
pub struct CupAndHandleDetector {
    pub cup_bars: Period,
    pub handle_bars: Period,
    /// Max relative difference between the two rim highs
    pub rim_tolerance: Ratio,
}

impl Default for CupAndHandleDetector {
    fn default() -> Self {
        Self {
            cup_bars: Period::new_const(20),
            handle_bars: Period::new_const(10),
            rim_tolerance: Ratio::new_const(0.03),
        }
    }
}

impl CupAndHandleDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        let cup_len = self.cup_bars.get();
        let start = window_start(index, cup_len + self.handle_bars.get())?;
        let cup = bars.get(start..start + cup_len)?;
        let handle = bars.get(start + cup_len..=index)?;
        let (first, last) = (cup.first()?, cup.last()?);

        if relative_diff(first.high(), last.high()) > self.rim_tolerance.get() {
            return None;
        }
        let rim = first.high().max(last.high());
        let bottom = lowest_low(cup);
        let depth = rim - bottom;
        if depth <= 0.0 {
            return None;
        }

        // handle pulls back, but stays in the upper half of the cup
        let handle_low = lowest_low(handle);
        if handle_low >= rim || handle_low <= bottom + depth / 2.0 {
            return None;
        }

        let (breakout, before) = handle.split_last()?;
        let fresh = before.iter().all(|b| b.close() <= rim);
        (fresh && breakout.close() > rim)
            .then(|| chart(ChartKind::CupAndHandle, start, index, handle_low))
    }
}

impl PatternDetector for CupAndHandleDetector {
    fn id(&self) -> PatternId {
        PatternId("CUP_AND_HANDLE")
    }

    fn min_bars(&self) -> usize {
        self.cup_bars.get() + self.handle_bars.get()
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        (0..candles.len())
            .filter_map(|i| self.detect_at(candles, i))
            .collect()
    }
}

// ============================================================
// INVERSE HEAD AND SHOULDERS
// ============================================================

/// Three troughs over left-shoulder, head and right-shoulder segments. The head
/// is the deepest, the shoulders are level, and price closes back above the
/// highest high of the head segment.
#[derive(Debug, Clone)]
pub struct InverseHeadAndShouldersDetector {
    pub left_shoulder_bars: Period,
    pub head_bars: Period,
    pub right_shoulder_bars: Period,
    pub shoulder_tolerance: Ratio,
}

impl Default for InverseHeadAndShouldersDetector {
    fn default() -> Self {
        Self {
            left_shoulder_bars: Period::new_const(10),
            head_bars: Period::new_const(20),
            right_shoulder_bars: Period::new_const(20),
            shoulder_tolerance: Ratio::new_const(0.03),
        }
    }
}

impl InverseHeadAndShouldersDetector {
    fn window(&self) -> usize {
        self.left_shoulder_bars.get() + self.head_bars.get() + self.right_shoulder_bars.get()
    }

    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        let start = window_start(index, self.window())?;
        let head_start = start + self.left_shoulder_bars.get();
        let right_start = head_start + self.head_bars.get();

        let left = bars.get(start..head_start)?;
        let head = bars.get(head_start..right_start)?;
        let right = bars.get(right_start..=index)?;

        let (left_low, head_low, right_low) =
            (lowest_low(left), lowest_low(head), lowest_low(right));
        if !(head_low < left_low && head_low < right_low) {
            return None;
        }
        if relative_diff(left_low, right_low) > self.shoulder_tolerance.get() {
            return None;
        }

        let neckline = highest_high(head);
        let prev_close = bars.get(index.checked_sub(1)?)?.close();
        let close = bars.get(index)?.close();
        (prev_close <= neckline && close > neckline).then(|| {
            chart(
                ChartKind::InverseHeadAndShoulders,
                start,
                index,
                right_low,
            )
        })
    }
}

impl PatternDetector for InverseHeadAndShouldersDetector {
    fn id(&self) -> PatternId {
        PatternId("INVERSE_HEAD_AND_SHOULDERS")
    }

    fn min_bars(&self) -> usize {
        self.window()
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        (0..candles.len())
            .filter_map(|i| self.detect_at(candles, i))
            .collect()
    }
}

// ============================================================
// FALLING WEDGE
// ============================================================

/// Highs and lows both fall across the window, highs faster than lows, then a
/// bullish candle closes above the prior candle's high.
#[derive(Debug, Clone)]
pub struct FallingWedgeDetector {
    pub window: Period,
}

impl Default for FallingWedgeDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
        }
    }
}

impl FallingWedgeDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        let start = window_start(index, self.window.get())?;
        let window = bars.get(start..=index)?;
        if window.len() < 4 {
            return None;
        }
        let (first, second) = window.split_at(window.len() / 2);

        let upper_drop = highest_high(first) - highest_high(second);
        let lower_drop = lowest_low(first) - lowest_low(second);
        if !(lower_drop > 0.0 && upper_drop > lower_drop) {
            return None;
        }

        let (curr, prev) = (bars.get(index)?, bars.get(index - 1)?);
        (curr.is_bullish() && curr.close() > prev.high())
            .then(|| chart(ChartKind::FallingWedge, start, index, lowest_low(second)))
    }
}

impl PatternDetector for FallingWedgeDetector {
    fn id(&self) -> PatternId {
        PatternId("FALLING_WEDGE")
    }

    fn min_bars(&self) -> usize {
        self.window.get()
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        (0..candles.len())
            .filter_map(|i| self.detect_at(candles, i))
            .collect()
    }
}

// ============================================================
// BULL FLAG
// ============================================================

/// A sharp pole followed by a drifting flag that holds the upper half of the
/// pole and stays below its top.
#[derive(Debug, Clone)]
pub struct BullFlagDetector {
    pub pole_bars: Period,
    pub flag_bars: Period,
    /// Minimum pole gain as a fraction of the pole's first open
    pub min_pole_gain: Ratio,
}

impl Default for BullFlagDetector {
    fn default() -> Self {
        Self {
            pole_bars: Period::new_const(5),
            flag_bars: Period::new_const(5),
            min_pole_gain: Ratio::new_const(0.03),
        }
    }
}

impl BullFlagDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        let pole_len = self.pole_bars.get();
        let start = window_start(index, pole_len + self.flag_bars.get())?;
        let pole = bars.get(start..start + pole_len)?;
        let flag = bars.get(start + pole_len..=index)?;

        let base = pole.first()?.open();
        let gain = pole.last()?.close() - base;
        if base <= 0.0 || gain / base < self.min_pole_gain.get() {
            return None;
        }

        let flag_low = lowest_low(flag);
        let drifting = flag.last()?.low() < flag.first()?.low();
        let holds = flag_low > base + gain / 2.0 && highest_high(flag) <= highest_high(pole);
        (drifting && holds).then(|| chart(ChartKind::BullFlag, start, index, flag_low))
    }
}

impl PatternDetector for BullFlagDetector {
    fn id(&self) -> PatternId {
        PatternId("BULL_FLAG")
    }

    fn min_bars(&self) -> usize {
        self.pole_bars.get() + self.flag_bars.get()
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        (0..candles.len())
            .filter_map(|i| self.detect_at(candles, i))
            .collect()
    }
}

// ============================================================
// ASCENDING TRIANGLE
// ============================================================

/// Flat resistance with rising lows over `window` bars, then a close above the
/// resistance.
#[derive(Debug, Clone)]
pub struct AscendingTriangleDetector {
    pub window: Period,
    /// Max relative difference between the resistance highs of each half
    pub flat_top_tolerance: Ratio,
}

impl Default for AscendingTriangleDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            flat_top_tolerance: Ratio::new_const(0.005),
        }
    }
}

impl AscendingTriangleDetector {
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        // the breakout candle sits after the triangle window
        let start = window_start(index.checked_sub(1)?, self.window.get())?;
        let window = bars.get(start..index)?;
        if window.len() < 4 {
            return None;
        }
        let (first, second) = window.split_at(window.len() / 2);

        let (top1, top2) = (highest_high(first), highest_high(second));
        if relative_diff(top1, top2) > self.flat_top_tolerance.get() {
            return None;
        }
        if lowest_low(second) <= lowest_low(first) {
            return None;
        }

        let resistance = top1.max(top2);
        (bars.get(index)?.close() > resistance).then(|| {
            chart(
                ChartKind::AscendingTriangle,
                start,
                index,
                lowest_low(second),
            )
        })
    }
}

impl PatternDetector for AscendingTriangleDetector {
    fn id(&self) -> PatternId {
        PatternId("ASCENDING_TRIANGLE")
    }

    fn min_bars(&self) -> usize {
        self.window.get() + 1
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        (0..candles.len())
            .filter_map(|i| self.detect_at(candles, i))
            .collect()
    }
}
