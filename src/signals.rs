//! Signals and the detection/scoring pipeline that produces them
//!
//! The backtest engine only sees the [`SignalSource`] trait. [`PatternSignalSource`]
//! is the standard implementation: scan for patterns completing on the latest
//! bar, keep those aligned with the regime, score them and drop the ones under
//! the confluence threshold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::Config, regime::MarketRegime, scorer::ConfluenceScorer, Candle, PatternScanner,
    Result, Side,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Entry,
    Add,
}

/// A scored trade proposal triggered by `candle`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub pattern_name: String,
    pub signal_type: SignalType,
    pub direction: Side,
    pub confluence_score: u8,
    pub stop_loss_price: f64,
    pub candle: Candle,
}

impl Signal {
    /// Signals enter at the triggering candle's close
    #[inline]
    pub fn entry_price(&self) -> f64 {
        self.candle.close
    }
}

/// What the engine hands a signal source on each bar
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub instrument: &'a str,
    /// Bounded trailing window of entry-timeframe bars; the last is the current bar
    pub entry_bars: &'a [Candle],
    /// Bars the regime is judged on: completed daily bars in multi-timeframe
    /// mode, otherwise the same slice as `entry_bars`
    pub regime_bars: &'a [Candle],
    /// Side of the instrument's open position, if any
    pub open_side: Option<Side>,
}

impl BarContext<'_> {
    pub fn current(&self) -> Option<&Candle> {
        self.entry_bars.last()
    }
}

/// Produces signals for the current bar. Errors fail the backtest.
pub trait SignalSource {
    fn signals(&mut self, ctx: &BarContext<'_>) -> Result<Vec<Signal>>;
}

impl<F> SignalSource for F
where
    F: FnMut(&BarContext<'_>) -> Result<Vec<Signal>>,
{
    fn signals(&mut self, ctx: &BarContext<'_>) -> Result<Vec<Signal>> {
        self(ctx)
    }
}

/// Pattern scanner + regime filter + confluence scorer
#[derive(Debug, Clone)]
pub struct PatternSignalSource {
    scanner: PatternScanner,
    scorer: ConfluenceScorer,
    min_confluence_score: u8,
    require_regime_alignment: bool,
}

impl PatternSignalSource {
    pub fn new(scanner: PatternScanner, min_confluence_score: u8) -> Self {
        Self {
            scanner,
            scorer: ConfluenceScorer::default(),
            min_confluence_score,
            require_regime_alignment: true,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let patterns = &config.patterns;
        Ok(Self::new(patterns.scanner()?, patterns.min_confluence_score)
            .require_regime_alignment(patterns.require_regime_alignment))
    }

    pub fn with_scorer(mut self, scorer: ConfluenceScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn require_regime_alignment(mut self, require: bool) -> Self {
        self.require_regime_alignment = require;
        self
    }

    pub fn scanner(&self) -> &PatternScanner {
        &self.scanner
    }

    /// Qualifying signals for the last bar of `ctx.entry_bars`, in detector order
    pub fn signals_at(&self, ctx: &BarContext<'_>) -> Vec<Signal> {
        let bars = ctx.entry_bars;
        let Some((last_index, candle)) = bars.len().checked_sub(1).zip(bars.last()) else {
            return Vec::new();
        };

        let swings = self.scanner.swings(bars);
        let patterns = self.scanner.scan_completed_at(bars, &swings, last_index);
        if patterns.is_empty() {
            return Vec::new();
        }

        let regime = if std::ptr::eq(ctx.regime_bars, bars) {
            MarketRegime::from_swings(&swings)
        } else {
            MarketRegime::from_swings(&self.scanner.swings(ctx.regime_bars))
        };

        let mut signals = Vec::new();
        for pattern in patterns {
            let side = pattern.side();
            if self.require_regime_alignment && !regime.aligns_with(side) {
                debug!(
                    instrument = ctx.instrument,
                    pattern = pattern.name(),
                    ?regime,
                    "pattern against regime"
                );
                continue;
            }

            let stop = pattern.invalidation_price();
            if !side.is_protective_stop(candle.close, stop) {
                continue;
            }

            let signal_type = match ctx.open_side {
                None => SignalType::Entry,
                Some(open) if open == side => SignalType::Add,
                Some(_) => continue,
            };

            let score = self.scorer.score(side, bars);
            if score.total < self.min_confluence_score {
                debug!(
                    instrument = ctx.instrument,
                    pattern = pattern.name(),
                    score = score.total,
                    min = self.min_confluence_score,
                    "below confluence threshold"
                );
                continue;
            }

            signals.push(Signal {
                instrument: ctx.instrument.to_string(),
                timestamp: candle.timestamp,
                pattern_name: pattern.name().to_string(),
                signal_type,
                direction: side,
                confluence_score: score.total,
                stop_loss_price: stop,
                candle: *candle,
            });
        }
        signals
    }
}

impl SignalSource for PatternSignalSource {
    fn signals(&mut self, ctx: &BarContext<'_>) -> Result<Vec<Signal>> {
        Ok(self.signals_at(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BuiltinDetector, EngulfingDetector, ScannerBuilder};
    use chrono::{Duration, TimeZone};

    fn candles(rows: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| {
                Candle::new(start + Duration::days(i as i64), o, h, l, c, 1000.0)
            })
            .collect()
    }

    fn engulfing_source() -> PatternSignalSource {
        let scanner = ScannerBuilder::new()
            .add(BuiltinDetector::Engulfing(EngulfingDetector::with_defaults()))
            .build()
            .unwrap();
        PatternSignalSource::new(scanner, 50)
    }

    fn bullish_engulfing_tail() -> Vec<Candle> {
        candles(&[
            (100.0, 101.0, 98.0, 99.0),
            (98.5, 102.0, 98.0, 101.5),
        ])
    }

    #[test]
    fn ranging_regime_blocks_signals() {
        let bars = bullish_engulfing_tail();
        let ctx = BarContext {
            instrument: "AAPL",
            entry_bars: &bars,
            regime_bars: &bars,
            open_side: None,
        };
        assert!(engulfing_source().signals_at(&ctx).is_empty());
    }

    #[test]
    fn engulfing_signal_without_regime_filter() {
        let bars = bullish_engulfing_tail();
        let ctx = BarContext {
            instrument: "AAPL",
            entry_bars: &bars,
            regime_bars: &bars,
            open_side: None,
        };
        let signals = engulfing_source()
            .require_regime_alignment(false)
            .signals_at(&ctx);
        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.pattern_name, "Engulfing");
        assert_eq!(signal.direction, Side::Long);
        assert_eq!(signal.signal_type, SignalType::Entry);
        assert_eq!(signal.stop_loss_price, 98.0);
        assert_eq!(signal.entry_price(), 101.5);
        assert!(signal.confluence_score >= 50);
    }

    #[test]
    fn same_side_position_yields_add() {
        let bars = bullish_engulfing_tail();
        let ctx = BarContext {
            instrument: "AAPL",
            entry_bars: &bars,
            regime_bars: &bars,
            open_side: Some(Side::Long),
        };
        let mut source = engulfing_source().require_regime_alignment(false);
        let signals = source.signals(&ctx).unwrap();
        assert_eq!(signals[0].signal_type, SignalType::Add);

        let opposite = BarContext {
            open_side: Some(Side::Short),
            ..ctx
        };
        assert!(source.signals(&opposite).unwrap().is_empty());
    }

    #[test]
    fn threshold_filters() {
        let bars = bullish_engulfing_tail();
        let ctx = BarContext {
            instrument: "AAPL",
            entry_bars: &bars,
            regime_bars: &bars,
            open_side: None,
        };
        let scanner = engulfing_source().scanner().clone();
        let strict = PatternSignalSource::new(scanner, 100).require_regime_alignment(false);
        assert!(strict.signals_at(&ctx).is_empty());
    }

    #[test]
    fn closures_are_sources() {
        let mut calls = 0;
        let mut source = |_: &BarContext<'_>| -> Result<Vec<Signal>> {
            calls += 1;
            Ok(Vec::new())
        };
        let bars = bullish_engulfing_tail();
        let ctx = BarContext {
            instrument: "AAPL",
            entry_bars: &bars,
            regime_bars: &bars,
            open_side: None,
        };
        assert!(source.signals(&ctx).unwrap().is_empty());
        drop(source);
        assert_eq!(calls, 1);
    }
}
