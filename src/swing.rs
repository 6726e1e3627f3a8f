//! Swing point extraction
//!
//! A swing high is a candle whose high is strictly greater than the highs of the
//! `k` candles on either side; swing lows mirror this on the lows. The first and
//! last `k` candles can never be swings, so a swing at index `i` is only known
//! once candle `i + k` has closed.

use serde::{Deserialize, Serialize};

use crate::{Period, OHLCV};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingKind {
    High,
    Low,
}

/// A local extreme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
}

impl SwingPoint {
    pub const fn high(index: usize, price: f64) -> Self {
        Self {
            index,
            price,
            kind: SwingKind::High,
        }
    }

    pub const fn low(index: usize, price: f64) -> Self {
        Self {
            index,
            price,
            kind: SwingKind::Low,
        }
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.kind == SwingKind::High
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        self.kind == SwingKind::Low
    }
}

/// Swing highs and lows of one candle sequence, each ordered by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Swings {
    pub highs: Vec<SwingPoint>,
    pub lows: Vec<SwingPoint>,
    /// Lookback the swings were extracted with; 0 for hand-built swing sets
    pub lookback: usize,
}

impl Swings {
    pub fn new(highs: Vec<SwingPoint>, lows: Vec<SwingPoint>, lookback: usize) -> Self {
        Self {
            highs,
            lows,
            lookback,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.highs.is_empty() && self.lows.is_empty()
    }

    /// Highs and lows interleaved by index
    pub fn merged(&self) -> Vec<SwingPoint> {
        let mut all: Vec<SwingPoint> = self.highs.iter().chain(&self.lows).copied().collect();
        all.sort_by_key(|p| p.index);
        all
    }

    /// First candle index at which a swing at `index` is confirmed
    #[inline]
    pub fn confirmed_at(&self, index: usize) -> usize {
        index + self.lookback
    }
}

/// Extract swing highs and lows with a symmetric window of `lookback` bars.
///
/// Ties disqualify: a candle whose high equals a neighbour's high is not a swing high.
pub fn find_swing_points<T: OHLCV>(candles: &[T], lookback: Period) -> Swings {
    let k = lookback.get();
    let mut swings = Swings::new(Vec::new(), Vec::new(), k);

    if candles.len() < 2 * k + 1 {
        return swings;
    }

    for i in k..candles.len() - k {
        let high = candles[i].high();
        let low = candles[i].low();
        let neighbours = (i - k..=i + k).filter(|&j| j != i);

        let mut is_high = true;
        let mut is_low = true;
        for j in neighbours {
            if candles[j].high() >= high {
                is_high = false;
            }
            if candles[j].low() <= low {
                is_low = false;
            }
            if !is_high && !is_low {
                break;
            }
        }

        if is_high {
            swings.highs.push(SwingPoint::high(i, high));
        }
        if is_low {
            swings.lows.push(SwingPoint::low(i, low));
        }
    }

    swings
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bar {
        h: f64,
        l: f64,
    }

    impl OHLCV for Bar {
        fn open(&self) -> f64 {
            (self.h + self.l) / 2.0
        }

        fn high(&self) -> f64 {
            self.h
        }

        fn low(&self) -> f64 {
            self.l
        }

        fn close(&self) -> f64 {
            (self.h + self.l) / 2.0
        }

        fn volume(&self) -> f64 {
            0.0
        }
    }

    fn bars(highs: &[f64]) -> Vec<Bar> {
        highs.iter().map(|&h| Bar { h, l: h - 2.0 }).collect()
    }

    #[test]
    fn finds_single_peak() {
        let candles = bars(&[10.0, 11.0, 12.0, 15.0, 12.0, 11.0, 10.0]);
        let swings = find_swing_points(&candles, Period::new_const(2));
        assert_eq!(swings.highs, vec![SwingPoint::high(3, 15.0)]);
        assert!(swings.lows.is_empty());
        assert_eq!(swings.confirmed_at(3), 5);
    }

    #[test]
    fn ties_are_not_swings() {
        let candles = bars(&[10.0, 12.0, 15.0, 15.0, 12.0, 10.0]);
        let swings = find_swing_points(&candles, Period::new_const(1));
        assert!(swings.highs.is_empty());
    }

    #[test]
    fn too_short_series_has_no_swings() {
        let candles = bars(&[10.0, 12.0, 10.0, 12.0]);
        let swings = find_swing_points(&candles, Period::new_const(2));
        assert!(swings.is_empty());
    }

    #[test]
    fn edges_are_excluded() {
        let candles = bars(&[20.0, 12.0, 11.0, 12.0, 20.0]);
        let swings = find_swing_points(&candles, Period::new_const(1));
        assert!(swings.highs.is_empty());
        assert_eq!(swings.lows, vec![SwingPoint::low(2, 9.0)]);
    }

    #[test]
    fn merged_is_index_ordered() {
        let candles = bars(&[10.0, 14.0, 10.0, 6.0, 10.0, 14.0, 10.0]);
        let swings = find_swing_points(&candles, Period::new_const(1));
        let kinds: Vec<_> = swings.merged().iter().map(|p| (p.index, p.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (1, SwingKind::High),
                (3, SwingKind::Low),
                (5, SwingKind::High)
            ]
        );
    }
}
