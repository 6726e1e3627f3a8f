//! Reversal pattern detectors: Engulfing, Double Top / Double Bottom

use super::helpers::relative_diff;
use crate::{
    swing::{SwingKind, SwingPoint, Swings},
    Direction, OHLCVExt, Pattern, PatternDetector, PatternId, Ratio, OHLCV,
};

impl_with_defaults!(EngulfingDetector, DoubleTopBottomDetector);

// ============================================================
// ENGULFING
// ============================================================

/// Two-candle engulfing: the current body strictly contains the previous body
/// and has the opposite colour.
#[derive(Debug, Clone, Default)]
pub struct EngulfingDetector;

impl EngulfingDetector {
    /// Check the pair ending at `index`
    pub fn detect_at<T: OHLCV>(&self, bars: &[T], index: usize) -> Option<Pattern> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        if prev.is_bearish()
            && curr.is_bullish()
            && curr.open() < prev.close()
            && curr.close() > prev.open()
        {
            return Some(Pattern::Engulfing {
                index,
                bias: Direction::Bullish,
                stop_loss: curr.low(),
            });
        }

        if prev.is_bullish()
            && curr.is_bearish()
            && curr.open() > prev.close()
            && curr.close() < prev.open()
        {
            return Some(Pattern::Engulfing {
                index,
                bias: Direction::Bearish,
                stop_loss: curr.high(),
            });
        }

        None
    }
}

impl PatternDetector for EngulfingDetector {
    fn id(&self) -> PatternId {
        PatternId("ENGULFING")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, candles: &[T], _swings: &Swings) -> Vec<Pattern> {
        (1..candles.len())
            .filter_map(|i| self.detect_at(candles, i))
            .collect()
    }
}

// ============================================================
// DOUBLE TOP / DOUBLE BOTTOM
// ============================================================

/// Two consecutive same-type swings at a similar price with an opposite swing
/// (the neckline) between them, confirmed by a close beyond the neckline.
#[derive(Debug, Clone)]
pub struct DoubleTopBottomDetector {
    /// Max `|p1 - p2| / p1` between the two peaks
    pub price_similarity_threshold: Ratio,
    /// Extra fraction of the neckline price the breakout close must clear
    pub neckline_break_confirmation: Ratio,
}

impl Default for DoubleTopBottomDetector {
    fn default() -> Self {
        Self {
            price_similarity_threshold: Ratio::new_const(0.01),
            neckline_break_confirmation: Ratio::new_const(0.0),
        }
    }
}

impl DoubleTopBottomDetector {
    pub fn new(price_similarity_threshold: Ratio, neckline_break_confirmation: Ratio) -> Self {
        Self {
            price_similarity_threshold,
            neckline_break_confirmation,
        }
    }

    fn tops<T: OHLCV>(&self, candles: &[T], swings: &Swings, out: &mut Vec<Pattern>) {
        for pair in swings.highs.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            let Some(neckline) = neckline_between(&swings.lows, first, second) else {
                continue;
            };
            if relative_diff(first.price, second.price) > self.price_similarity_threshold.get() {
                continue;
            }
            let trigger = neckline.price * (1.0 - self.neckline_break_confirmation.get());
            let Some(breakout_index) =
                first_close_beyond(candles, second.index, |close| close < trigger)
            else {
                continue;
            };
            out.push(Pattern::DoubleTop {
                first_peak: first,
                second_peak: second,
                neckline,
                breakout_index,
                confirmed_at: breakout_index.max(swings.confirmed_at(second.index)),
                stop_loss: first.price.max(second.price),
            });
        }
    }

    fn bottoms<T: OHLCV>(&self, candles: &[T], swings: &Swings, out: &mut Vec<Pattern>) {
        for pair in swings.lows.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            let Some(neckline) = neckline_between(&swings.highs, first, second) else {
                continue;
            };
            if relative_diff(first.price, second.price) > self.price_similarity_threshold.get() {
                continue;
            }
            let trigger = neckline.price * (1.0 + self.neckline_break_confirmation.get());
            let Some(breakout_index) =
                first_close_beyond(candles, second.index, |close| close > trigger)
            else {
                continue;
            };
            out.push(Pattern::DoubleBottom {
                first_trough: first,
                second_trough: second,
                neckline,
                breakout_index,
                confirmed_at: breakout_index.max(swings.confirmed_at(second.index)),
                stop_loss: first.price.min(second.price),
            });
        }
    }
}

/// Most extreme opposite-type swing strictly between the two peaks
fn neckline_between(
    opposite: &[SwingPoint],
    first: SwingPoint,
    second: SwingPoint,
) -> Option<SwingPoint> {
    let between = opposite
        .iter()
        .filter(|p| first.index < p.index && p.index < second.index)
        .copied();
    match first.kind {
        SwingKind::High => between.min_by(|a, b| a.price.total_cmp(&b.price)),
        SwingKind::Low => between.max_by(|a, b| a.price.total_cmp(&b.price)),
    }
}

fn first_close_beyond<T: OHLCV>(
    candles: &[T],
    after: usize,
    crossed: impl Fn(f64) -> bool,
) -> Option<usize> {
    candles
        .iter()
        .enumerate()
        .skip(after + 1)
        .find(|(_, c)| crossed(c.close()))
        .map(|(i, _)| i)
}

impl PatternDetector for DoubleTopBottomDetector {
    fn id(&self) -> PatternId {
        PatternId("DOUBLE_TOP_BOTTOM")
    }

    fn min_bars(&self) -> usize {
        4
    }

    fn detect<T: OHLCV>(&self, candles: &[T], swings: &Swings) -> Vec<Pattern> {
        let mut out = Vec::new();
        self.tops(candles, swings, &mut out);
        self.bottoms(candles, swings, &mut out);
        out
    }
}
