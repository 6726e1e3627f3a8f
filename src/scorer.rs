//! Confluence scoring
//!
//! An additive checklist capped at 100. The regime baseline is granted
//! unconditionally: candidates reaching the scorer have already been
//! regime-filtered.

use serde::Serialize;
use tracing::debug;

use crate::{
    fibonacci::{FibLevel, FibLevels},
    OHLCVExt, Side, OHLCV,
};

pub const REGIME_POINTS: u8 = 50;
pub const FIB_POINTS: u8 = 20;
pub const VOLUME_POINTS: u8 = 15;
pub const CLOSE_STRENGTH_POINTS: u8 = 15;
pub const MAX_SCORE: u8 = 100;

/// Score with the checks that contributed to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfluenceScore {
    pub total: u8,
    pub near_fib_level: Option<FibLevel>,
    pub volume_confirmed: bool,
    pub strong_close: bool,
}

#[derive(Debug, Clone)]
pub struct ConfluenceScorer {
    /// Bars the Fibonacci range is taken over
    pub fib_lookback: usize,
    /// Max relative distance between entry and a retracement level
    pub fib_proximity: f64,
    /// Bars preceding the signal candle averaged for volume
    pub volume_lookback: usize,
    pub volume_multiplier: f64,
    /// Fraction of the range the close must clear in the signal's direction
    pub strong_close_fraction: f64,
}

impl Default for ConfluenceScorer {
    fn default() -> Self {
        Self {
            fib_lookback: 20,
            fib_proximity: 0.005,
            volume_lookback: 10,
            volume_multiplier: 1.5,
            strong_close_fraction: 0.66,
        }
    }
}

impl ConfluenceScorer {
    /// Score a `side` signal whose candle is the last element of `history`.
    pub fn score<T: OHLCV>(&self, side: Side, history: &[T]) -> ConfluenceScore {
        let Some(candle) = history.last() else {
            return ConfluenceScore {
                total: REGIME_POINTS,
                near_fib_level: None,
                volume_confirmed: false,
                strong_close: false,
            };
        };

        let near_fib_level = self.fib_confluence(side, history, candle.close());
        let volume_confirmed = self.volume_confirmed(history);
        let strong_close = self.strong_close(side, candle);

        let mut total = REGIME_POINTS;
        if near_fib_level.is_some() {
            total += FIB_POINTS;
        }
        if volume_confirmed {
            total += VOLUME_POINTS;
        }
        if strong_close {
            total += CLOSE_STRENGTH_POINTS;
        }

        let score = ConfluenceScore {
            total: total.min(MAX_SCORE),
            near_fib_level,
            volume_confirmed,
            strong_close,
        };
        debug!(
            side = %side,
            total = score.total,
            fib = ?score.near_fib_level.map(|l| l.ratio),
            volume = score.volume_confirmed,
            strong_close = score.strong_close,
            "confluence score"
        );
        score
    }

    fn fib_confluence<T: OHLCV>(
        &self,
        side: Side,
        history: &[T],
        entry: f64,
    ) -> Option<FibLevel> {
        if history.len() <= self.fib_lookback {
            return None;
        }
        let window = &history[history.len() - self.fib_lookback..];
        // a flat window has no levels to be near
        let levels = FibLevels::from_candles(window).ok()?;
        levels.retracement_near(side, entry, self.fib_proximity)
    }

    fn volume_confirmed<T: OHLCV>(&self, history: &[T]) -> bool {
        if history.len() <= self.volume_lookback || self.volume_lookback == 0 {
            return false;
        }
        let (candle, before) = match history.split_last() {
            Some(split) => split,
            None => return false,
        };
        let preceding = &before[before.len() - self.volume_lookback..];
        let mean = preceding.iter().map(|c| c.volume()).sum::<f64>() / preceding.len() as f64;
        candle.volume() > self.volume_multiplier * mean
    }

    fn strong_close<T: OHLCV>(&self, side: Side, candle: &T) -> bool {
        let Some(location) = candle.close_location() else {
            return false;
        };
        match side {
            Side::Long => location > self.strong_close_fraction,
            Side::Short => 1.0 - location > self.strong_close_fraction,
        }
    }
}
