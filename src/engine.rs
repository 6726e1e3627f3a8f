//! Event-driven backtest engine
//!
//! Replays every instrument's entry bars on one merged timeline. Per bar an open
//! position is checked against its stop, then the trailing stop is maintained,
//! then the signal source is consulted. After every instrument has seen a
//! timestamp the account is marked to market and an equity point is recorded.
//!
//! The engine is single-threaded and deterministic. [`Backtester::step`] advances
//! one timestamp, so a run can be interrupted between bars with a [`CancelFlag`].

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::{
    account::{Account, EntryFill, EquityPoint, Position, Trade},
    config::Config,
    data::{InstrumentFeed, MarketData},
    detectors::helpers::{highest_high, lowest_low},
    report::PerformanceSummary,
    risk::{calculate_position_size, RiskGate},
    signals::{BarContext, PatternSignalSource, Signal, SignalSource, SignalType},
    Candle, Result, Side,
};

// ============================================================
// CANCELLATION
// ============================================================

/// Shared flag checked between bars by [`Backtester::run_until`]
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run ended. `bars` counts timestamps processed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed { bars: usize },
    Cancelled { bars: usize },
}

// ============================================================
// REPORT
// ============================================================

/// Everything a run produced, handed verbatim to reporting
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub initial_equity: f64,
    /// Last mark-to-market equity, or the initial equity if nothing was processed
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Instruments dropped because they had no entry bars
    pub skipped_instruments: Vec<String>,
    /// Positions still open when the run stopped
    pub open_positions: Vec<Position>,
}

impl BacktestReport {
    pub fn summary(&self, annualization: Option<f64>) -> PerformanceSummary {
        PerformanceSummary::compute(
            &self.trades,
            &self.equity_curve,
            self.initial_equity,
            annualization,
        )
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_open())
    }
}

// ============================================================
// ENGINE
// ============================================================

#[derive(Debug)]
struct FeedState {
    instrument: String,
    feed: InstrumentFeed,
    /// Next entry bar to process
    cursor: usize,
    /// Daily bars dated strictly before the current entry bar
    completed_daily: usize,
}

/// Backtest over [`MarketData`] driven by a [`SignalSource`]
#[derive(Debug)]
pub struct Backtester<S: SignalSource> {
    config: Config,
    source: S,
    gate: RiskGate,
    account: Account,
    feeds: Vec<FeedState>,
    timeline: Vec<DateTime<Utc>>,
    next: usize,
    skipped: Vec<String>,
    day: Option<NaiveDate>,
    day_reference_equity: f64,
}

impl Backtester<PatternSignalSource> {
    /// Engine wired to the pattern pipeline described by `config.patterns`
    pub fn with_pattern_signals(data: MarketData, config: Config) -> Result<Self> {
        let source = PatternSignalSource::from_config(&config)?;
        Backtester::new(data, config, source)
    }
}

impl<S: SignalSource> Backtester<S> {
    /// Validate `config` and every feed, then build the merged timeline.
    ///
    /// Configured instruments with no feed, and feeds missing entry or regime
    /// bars, are skipped with a warning. Unordered or malformed candles are an
    /// error.
    pub fn new(data: MarketData, config: Config, source: S) -> Result<Self> {
        config.validate()?;

        let mut feeds = Vec::with_capacity(data.len());
        let mut skipped = Vec::new();
        for instrument in &config.instruments {
            if data.get(instrument).is_none() && !skipped.contains(instrument) {
                warn!(%instrument, "no feed for configured instrument, skipped");
                skipped.push(instrument.clone());
            }
        }

        let mut timestamps = BTreeSet::new();
        for (instrument, feed) in data {
            if feed.is_empty() {
                warn!(%instrument, "missing candle data, instrument skipped");
                skipped.push(instrument);
                continue;
            }
            feed.validate(&instrument)?;
            timestamps.extend(feed.entry_bars().iter().map(|c| c.timestamp));
            feeds.push(FeedState {
                instrument,
                feed,
                cursor: 0,
                completed_daily: 0,
            });
        }
        let timeline: Vec<_> = timestamps.into_iter().collect();

        let mut account = Account::new(config.account.equity);
        if let Some(&first) = timeline.first() {
            account.record_equity(first)?;
        }

        Ok(Self {
            gate: RiskGate::new(config.risk_limits()),
            day_reference_equity: config.account.equity,
            config,
            source,
            account,
            feeds,
            timeline,
            next: 0,
            skipped,
            day: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Timestamps in the merged timeline
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Timestamps processed so far
    pub fn bars_processed(&self) -> usize {
        self.next
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.timeline.len()
    }

    pub fn skipped_instruments(&self) -> &[String] {
        &self.skipped
    }

    /// Process every instrument's bar at the next timestamp.
    /// Returns that timestamp, or `None` once the timeline is exhausted.
    pub fn step(&mut self) -> Result<Option<DateTime<Utc>>> {
        let Some(&timestamp) = self.timeline.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let date = timestamp.date_naive();
        if self.day != Some(date) {
            self.day = Some(date);
            self.day_reference_equity = self.account.equity();
        }

        for feed in &mut self.feeds {
            let bars = feed.feed.entry_bars();
            if bars.get(feed.cursor).map(|c| c.timestamp) != Some(timestamp) {
                continue;
            }
            let index = feed.cursor;
            feed.cursor += 1;

            process_bar(
                feed,
                index,
                &self.config,
                &self.gate,
                &mut self.account,
                &mut self.source,
                self.day_reference_equity,
            )?;
        }

        self.account.record_equity(timestamp)?;
        Ok(Some(timestamp))
    }

    /// Process all remaining timestamps
    pub fn run(&mut self) -> Result<RunStatus> {
        self.run_until(&CancelFlag::new())
    }

    /// Process remaining timestamps until the timeline ends or `cancel` is set.
    /// A cancelled run keeps everything processed so far.
    pub fn run_until(&mut self, cancel: &CancelFlag) -> Result<RunStatus> {
        let span = info_span!(
            "backtest",
            instruments = self.feeds.len(),
            bars = self.timeline.len()
        );
        let _guard = span.enter();

        while !self.is_finished() {
            if cancel.is_cancelled() {
                info!(bars = self.next, "backtest cancelled");
                return Ok(RunStatus::Cancelled { bars: self.next });
            }
            self.step()?;
        }

        info!(
            bars = self.next,
            trades = self.account.trade_history().len(),
            equity = self.account.equity(),
            "backtest complete"
        );
        Ok(RunStatus::Completed { bars: self.next })
    }

    pub fn into_report(self) -> BacktestReport {
        let initial_equity = self.account.initial_equity();
        let (trades, equity_curve, open_positions) = self.account.into_parts();
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_equity);
        BacktestReport {
            initial_equity,
            final_equity,
            trades,
            equity_curve,
            skipped_instruments: self.skipped,
            open_positions,
        }
    }
}

// ============================================================
// BAR PROCESSING
// ============================================================

fn process_bar<S: SignalSource>(
    feed: &mut FeedState,
    index: usize,
    config: &Config,
    gate: &RiskGate,
    account: &mut Account,
    source: &mut S,
    day_reference_equity: f64,
) -> Result<()> {
    let instrument = feed.instrument.as_str();
    let bars = feed.feed.entry_bars();
    let bar = &bars[index];
    let history = &bars[..=index];

    if account.position(instrument).is_some() {
        manage_open_position(account, config, instrument, history)?;
    }

    let window = config.backtest.detection_window.get();
    let entry_bars = &history[history.len().saturating_sub(window)..];
    let regime_bars = match feed.feed.regime_bars() {
        Some(daily) => {
            let date = bar.timestamp.date_naive();
            while daily
                .get(feed.completed_daily)
                .is_some_and(|d| d.timestamp.date_naive() < date)
            {
                feed.completed_daily += 1;
            }
            let completed = &daily[..feed.completed_daily];
            &completed[completed.len().saturating_sub(window)..]
        }
        None => entry_bars,
    };

    let ctx = BarContext {
        instrument,
        entry_bars,
        regime_bars,
        open_side: account.position(instrument).map(|p| p.direction),
    };
    let signals = source.signals(&ctx)?;

    for signal in &signals {
        let open_side = account.position(instrument).map(|p| p.direction);
        let acted = match (signal.signal_type, open_side) {
            (SignalType::Entry, None) => {
                open_entry(account, config, gate, instrument, signal, day_reference_equity)?
            }
            (SignalType::Add, Some(side)) if side == signal.direction => {
                add_on(account, config, gate, instrument, signal)?
            }
            (SignalType::Add, None) => {
                warn!(%instrument, pattern = %signal.pattern_name, "add signal while flat ignored");
                false
            }
            _ => false,
        };
        if acted {
            break;
        }
    }

    account.mark(instrument, bar.close);
    Ok(())
}

/// Stop check against the prior stop, then trailing activation and ratchet.
fn manage_open_position(
    account: &mut Account,
    config: &Config,
    instrument: &str,
    history: &[Candle],
) -> Result<()> {
    let (Some(bar), Some(position), Some(stop)) = (
        history.last(),
        account.position(instrument),
        account.stop_loss(instrument),
    ) else {
        return Ok(());
    };
    let side = position.direction;
    let gain = side.sign() * (bar.close - position.average_entry_price);
    let activate =
        !position.trailing_active && position.initial_risk > 0.0 && gain >= position.initial_risk;

    let breached = match side {
        Side::Long => bar.low <= stop,
        Side::Short => bar.high >= stop,
    };
    if breached {
        let price = adverse_fill(side.opposite(), stop, config.execution.slippage_pct);
        let pnl = account.close_position(instrument, bar.timestamp, price)?;
        info!(%instrument, direction = %side, price, pnl, "position closed at stop");
        return Ok(());
    }

    if activate {
        account.activate_trailing(instrument)?;
        debug!(%instrument, gain, "trailing stop active");
    }

    let trailing_active = account
        .position(instrument)
        .is_some_and(|p| p.trailing_active);
    let trailing_window = config.backtest.trailing_window.get();
    if trailing_active && history.len() >= trailing_window {
        let candidate = trailing_extreme(side, &history[history.len() - trailing_window..]);
        if account.ratchet_stop(instrument, candidate)? {
            debug!(%instrument, stop = candidate, "trailing stop moved");
        }
    }
    Ok(())
}

/// Lowest low for a long, highest high for a short
fn trailing_extreme(side: Side, window: &[Candle]) -> f64 {
    match side {
        Side::Long => lowest_low(window),
        Side::Short => highest_high(window),
    }
}

/// Price moved against whoever is trading `side`
fn adverse_fill(side: Side, price: f64, slippage_pct: f64) -> f64 {
    price * (1.0 + side.sign() * slippage_pct / 100.0)
}

fn open_entry(
    account: &mut Account,
    config: &Config,
    gate: &RiskGate,
    instrument: &str,
    signal: &Signal,
    day_reference_equity: f64,
) -> Result<bool> {
    let decision = gate.check_new_entry(
        account.open_positions(),
        account.equity(),
        day_reference_equity,
    );
    if !decision.is_accept() {
        debug!(%instrument, ?decision, "entry rejected by risk gate");
        return Ok(false);
    }

    let side = signal.direction;
    let price = adverse_fill(side, signal.entry_price(), config.execution.slippage_pct);
    let stop = signal.stop_loss_price;
    if !side.is_protective_stop(price, stop) {
        debug!(%instrument, price, stop, "stop not protective at fill price");
        return Ok(false);
    }

    let size = calculate_position_size(
        account.equity(),
        config.risk.per_trade_risk_pct,
        price,
        stop,
        signal.confluence_score,
    );
    if !(size > 0.0) {
        debug!(%instrument, price, stop, "zero position size, signal skipped");
        return Ok(false);
    }

    let new_risk = size * (price - stop).abs();
    let decision = gate.check_concurrent_risk(account.open_risk(), new_risk, account.equity());
    if !decision.is_accept() {
        debug!(%instrument, ?decision, "entry rejected by risk gate");
        return Ok(false);
    }

    let id = account.open_position(EntryFill {
        instrument,
        direction: side,
        pattern_name: &signal.pattern_name,
        timestamp: signal.candle.timestamp,
        price,
        size,
        stop_loss_price: stop,
        commission: config.execution.commission_per_trade,
    })?;
    info!(
        %instrument,
        trade = id,
        pattern = %signal.pattern_name,
        direction = %side,
        price,
        size,
        stop,
        score = signal.confluence_score,
        "position opened"
    );
    Ok(true)
}

fn add_on(
    account: &mut Account,
    config: &Config,
    gate: &RiskGate,
    instrument: &str,
    signal: &Signal,
) -> Result<bool> {
    let Some(position) = account.position(instrument) else {
        return Ok(false);
    };
    if !config.risk.allow_add_ons || position.add_ons >= config.risk.max_add_ons {
        debug!(%instrument, add_ons = position.add_ons, "add-on limit reached");
        return Ok(false);
    }

    let side = signal.direction;
    let price = adverse_fill(side, signal.entry_price(), config.execution.slippage_pct);
    let stop = signal.stop_loss_price;
    if !side.is_protective_stop(price, stop) {
        return Ok(false);
    }
    let size = calculate_position_size(
        account.equity(),
        config.risk.per_trade_risk_pct,
        price,
        stop,
        signal.confluence_score,
    );
    if !(size > 0.0) {
        debug!(%instrument, price, stop, "zero add-on size, signal skipped");
        return Ok(false);
    }

    let new_risk = size * (price - stop).abs();
    let decision = gate.check_concurrent_risk(account.open_risk(), new_risk, account.equity());
    if !decision.is_accept() {
        debug!(%instrument, ?decision, "add-on rejected by risk gate");
        return Ok(false);
    }

    account.add_to_position(
        instrument,
        price,
        size,
        stop,
        config.execution.commission_per_trade,
    )?;
    info!(
        %instrument,
        pattern = %signal.pattern_name,
        price,
        size,
        "position increased"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, low: f64, high: f64) -> Candle {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Candle::new(ts, low, high, low, high, 100.0)
    }

    #[test]
    fn trailing_extreme_by_side() {
        let window = [bar(1, 10.0, 12.0), bar(2, 9.0, 13.0), bar(3, 11.0, 12.5)];
        assert_eq!(trailing_extreme(Side::Long, &window), 9.0);
        assert_eq!(trailing_extreme(Side::Short, &window), 13.0);
    }

    #[test]
    fn adverse_fill_direction() {
        assert!((adverse_fill(Side::Long, 100.0, 1.0) - 101.0).abs() < 1e-9);
        assert!((adverse_fill(Side::Short, 100.0, 1.0) - 99.0).abs() < 1e-9);
        assert_eq!(adverse_fill(Side::Long, 100.0, 0.0), 100.0);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!flag.is_cancelled());
        other.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn empty_data_finishes_immediately() {
        let mut engine = Backtester::new(
            MarketData::new(),
            Config::default(),
            |_: &BarContext<'_>| -> Result<Vec<Signal>> { Ok(Vec::new()) },
        )
        .unwrap();
        assert!(engine.is_empty());
        assert_eq!(engine.run().unwrap(), RunStatus::Completed { bars: 0 });
        let report = engine.into_report();
        assert_eq!(report.final_equity, report.initial_equity);
        assert!(report.equity_curve.is_empty());
    }
}
