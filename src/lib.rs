//! # pivotbt - swing-pivot pattern signals and backtesting
//!
//! Detects chart geometries (engulfing, double tops/bottoms, AB=CD, Gartley and a
//! set of simple candlestick/chart heuristics) from price swings, scores them into
//! directional signals and replays those signals against a simulated account.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use pivotbt::prelude::*;
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let candles: Vec<Candle> = (0..120)
//!     .map(|i| {
//!         let base = 100.0 + (i as f64 * 0.3).sin() * 5.0;
//!         Candle::new(start + Duration::days(i), base, base + 1.0, base - 1.0, base + 0.2, 1_000.0)
//!     })
//!     .collect();
//!
//! // Scan for patterns
//! let scanner = ScannerBuilder::new().with_all_defaults().build().unwrap();
//! let _patterns = scanner.scan(&candles).unwrap();
//!
//! // Replay the pattern pipeline against a simulated account
//! let mut data = MarketData::new();
//! data.insert("DEMO", InstrumentFeed::Single(candles));
//! let mut backtester = Backtester::with_pattern_signals(data, Config::default()).unwrap();
//! backtester.run().unwrap();
//! let report = backtester.into_report();
//! assert!(!report.equity_curve.is_empty());
//! ```

pub mod account;
pub mod config;
pub mod data;
pub mod detectors;
pub mod engine;
pub mod fibonacci;
pub mod regime;
pub mod report;
pub mod risk;
pub mod scorer;
pub mod signals;
pub mod swing;

pub mod prelude {
    pub use crate::{
        // Account state
        account::{Account, EquityPoint, Position, Trade, TradeStatus},
        // Configuration
        config::{Config, PatternSettings},
        // Candle ingestion
        data::{load_csv, InstrumentFeed, MarketData},
        // Detectors
        detectors::*,
        // Engine
        engine::{BacktestReport, Backtester, CancelFlag, RunStatus},
        fibonacci::FibLevels,
        regime::MarketRegime,
        report::PerformanceSummary,
        risk::{calculate_position_size, GateDecision, RiskGate},
        scan_parallel,
        scorer::{ConfluenceScore, ConfluenceScorer},
        signals::{BarContext, PatternSignalSource, Signal, SignalSource, SignalType},
        swing::{find_swing_points, SwingKind, SwingPoint, Swings},
        BuiltinDetector,
        Candle,
        CandlestickKind,
        ChartKind,
        Direction,
        Error,
        OHLCVExt,
        Pattern,
        PatternDetector,
        PatternId,
        PatternScanner,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        ScannerBuilder,
        Side,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by detection, configuration, ingestion and the backtest loop
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Invalid OHLCV at index {index}: {reason}")]
    InvalidOHLCV { index: usize, reason: &'static str },

    #[error("Fibonacci range needs high > low (high = {high}, low = {low})")]
    InvalidFibRange { high: f64, low: f64 },

    #[error("{instrument}: candle {index} is not after its predecessor")]
    UnorderedCandles { instrument: String, index: usize },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("No open position for {0}")]
    NoOpenPosition(String),

    #[error("Signal source failed: {0}")]
    SignalSource(String),

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(Error::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(Error::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Midpoint of the real body
    #[inline]
    fn body_midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    /// Where the close sits inside the range: 0.0 at the low, 1.0 at the high.
    /// Returns None if range ≈ 0
    #[inline]
    fn close_location(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| (self.close() - self.low()) / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
        {
            return Err(Error::InvalidOHLCV {
                index: 0,
                reason: "NaN in OHLCV",
            });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(Error::InvalidOHLCV {
                index: 0,
                reason: "Infinite value in OHLCV",
            });
        }
        if self.high() < self.low() {
            return Err(Error::InvalidOHLCV {
                index: 0,
                reason: "high < low",
            });
        }
        if self.volume() < 0.0 {
            return Err(Error::InvalidOHLCV {
                index: 0,
                reason: "negative volume",
            });
        }
        Ok(())
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// CANDLE
// ============================================================

/// One OHLCV bar of one instrument
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        timestamp: chrono::DateTime<chrono::Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp.timestamp())
    }
}

// ============================================================
// DIRECTION / SIDE
// ============================================================

/// Directional bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bullish(self) -> bool {
        matches!(self, Direction::Bullish)
    }

    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }

    /// Trade side that follows this bias
    #[inline]
    pub fn side(self) -> Side {
        match self {
            Direction::Bullish => Side::Long,
            Direction::Bearish => Side::Short,
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// True when `stop` sits on the losing side of `entry`
    #[inline]
    pub fn is_protective_stop(self, entry: f64, stop: f64) -> bool {
        match self {
            Side::Long => stop < entry,
            Side::Short => stop > entry,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// PATTERNS - closed tagged variant, one case per pattern kind
// ============================================================

/// Unique identifier for a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub &'static str);

impl PatternId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// Simple single/multi candle heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandlestickKind {
    Hammer,
    MorningStar,
    PiercingLine,
    ThreeWhiteSoldiers,
}

impl CandlestickKind {
    pub fn name(self) -> &'static str {
        match self {
            CandlestickKind::Hammer => "Hammer",
            CandlestickKind::MorningStar => "Morning Star",
            CandlestickKind::PiercingLine => "Piercing Line",
            CandlestickKind::ThreeWhiteSoldiers => "Three White Soldiers",
        }
    }

    /// All supported heuristics are bullish reversal/continuation shapes
    pub fn bias(self) -> Direction {
        Direction::Bullish
    }
}

/// Window-based chart heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    CupAndHandle,
    InverseHeadAndShoulders,
    FallingWedge,
    BullFlag,
    AscendingTriangle,
}

impl ChartKind {
    pub fn name(self) -> &'static str {
        match self {
            ChartKind::CupAndHandle => "Cup and Handle",
            ChartKind::InverseHeadAndShoulders => "Inverse Head and Shoulders",
            ChartKind::FallingWedge => "Falling Wedge",
            ChartKind::BullFlag => "Bull Flag",
            ChartKind::AscendingTriangle => "Ascending Triangle",
        }
    }

    pub fn bias(self) -> Direction {
        Direction::Bullish
    }
}

use swing::SwingPoint;

/// A detected pattern, carrying only the key points of its kind
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum Pattern {
    Engulfing {
        index: usize,
        bias: Direction,
        stop_loss: f64,
    },
    DoubleTop {
        first_peak: SwingPoint,
        second_peak: SwingPoint,
        neckline: SwingPoint,
        breakout_index: usize,
        /// Bar on which both peaks are confirmed swings and the neckline is broken
        confirmed_at: usize,
        stop_loss: f64,
    },
    DoubleBottom {
        first_trough: SwingPoint,
        second_trough: SwingPoint,
        neckline: SwingPoint,
        breakout_index: usize,
        confirmed_at: usize,
        stop_loss: f64,
    },
    Abcd {
        a: SwingPoint,
        b: SwingPoint,
        c: SwingPoint,
        /// Projected, not observed
        d: SwingPoint,
        bias: Direction,
        confirmed_at: usize,
    },
    Gartley {
        x: SwingPoint,
        a: SwingPoint,
        b: SwingPoint,
        c: SwingPoint,
        d: SwingPoint,
        bias: Direction,
        confirmed_at: usize,
    },
    Candlestick {
        kind: CandlestickKind,
        start_index: usize,
        index: usize,
        stop_loss: f64,
    },
    Chart {
        kind: ChartKind,
        start_index: usize,
        index: usize,
        stop_loss: f64,
    },
}

impl Pattern {
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Engulfing { .. } => "Engulfing",
            Pattern::DoubleTop { .. } => "Double Top",
            Pattern::DoubleBottom { .. } => "Double Bottom",
            Pattern::Abcd { .. } => "AB=CD",
            Pattern::Gartley { .. } => "Gartley",
            Pattern::Candlestick { kind, .. } => kind.name(),
            Pattern::Chart { kind, .. } => kind.name(),
        }
    }

    pub fn bias(&self) -> Direction {
        match *self {
            Pattern::Engulfing { bias, .. }
            | Pattern::Abcd { bias, .. }
            | Pattern::Gartley { bias, .. } => bias,
            Pattern::DoubleTop { .. } => Direction::Bearish,
            Pattern::DoubleBottom { .. } => Direction::Bullish,
            Pattern::Candlestick { kind, .. } => kind.bias(),
            Pattern::Chart { kind, .. } => kind.bias(),
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.bias().side()
    }

    /// Index of the candle on which the pattern becomes fully known
    pub fn completed_at(&self) -> usize {
        match *self {
            Pattern::Engulfing { index, .. }
            | Pattern::Candlestick { index, .. }
            | Pattern::Chart { index, .. } => index,
            Pattern::DoubleTop { confirmed_at, .. }
            | Pattern::DoubleBottom { confirmed_at, .. }
            | Pattern::Abcd { confirmed_at, .. }
            | Pattern::Gartley { confirmed_at, .. } => confirmed_at,
        }
    }

    /// Price beyond which the pattern is invalidated; used as the signal's stop
    pub fn invalidation_price(&self) -> f64 {
        match *self {
            Pattern::Engulfing { stop_loss, .. }
            | Pattern::DoubleTop { stop_loss, .. }
            | Pattern::DoubleBottom { stop_loss, .. }
            | Pattern::Candlestick { stop_loss, .. }
            | Pattern::Chart { stop_loss, .. } => stop_loss,
            Pattern::Abcd { c, .. } => c.price,
            Pattern::Gartley { x, .. } => x.price,
        }
    }
}

// ============================================================
// PATTERN DETECTOR TRAIT
// ============================================================

use swing::Swings;

/// Pattern detector contract: pure, never mutates its inputs, and returns an
/// empty list rather than erroring on insufficient data.
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;

    /// Fewest candles for which the detector can produce anything
    fn min_bars(&self) -> usize;

    fn detect<T: OHLCV>(&self, candles: &[T], swings: &Swings) -> Vec<Pattern>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, candles: &[T], swings: &Swings) -> Vec<Pattern> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, candles, swings)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Reversal
    Engulfing(EngulfingDetector),
    DoubleTopBottom(DoubleTopBottomDetector),

    // Harmonic
    Abcd(AbcdDetector),
    Gartley(GartleyDetector),

    // Candlestick heuristics
    Hammer(HammerDetector),
    MorningStar(MorningStarDetector),
    PiercingLine(PiercingLineDetector),
    ThreeWhiteSoldiers(ThreeWhiteSoldiersDetector),

    // Chart heuristics
    CupAndHandle(CupAndHandleDetector),
    InverseHeadAndShoulders(InverseHeadAndShouldersDetector),
    FallingWedge(FallingWedgeDetector),
    BullFlag(BullFlagDetector),
    AscendingTriangle(AscendingTriangleDetector),
}

// ============================================================
// PATTERN SCANNER
// ============================================================

/// Default symmetric swing lookback (bars on each side)
pub const DEFAULT_SWING_LOOKBACK: Period = Period::new_const(5);

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub swing_lookback: Period,
    pub validate_data: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            swing_lookback: DEFAULT_SWING_LOOKBACK,
            validate_data: false,
        }
    }
}

/// Runs a fixed set of detectors over a candle sequence
#[derive(Debug, Clone)]
pub struct PatternScanner {
    detectors: Vec<BuiltinDetector>,
    config: ScannerConfig,
}

impl PatternScanner {
    #[inline]
    pub fn detectors(&self) -> &[BuiltinDetector] {
        &self.detectors
    }

    #[inline]
    pub fn swing_lookback(&self) -> Period {
        self.config.swing_lookback
    }

    /// Extract swing points with the scanner's lookback
    pub fn swings<T: OHLCV>(&self, candles: &[T]) -> Swings {
        swing::find_swing_points(candles, self.config.swing_lookback)
    }

    /// Scan all candles and return every detected pattern, in detector order.
    pub fn scan<T: OHLCV>(&self, candles: &[T]) -> Result<Vec<Pattern>> {
        if self.config.validate_data {
            validate_bars(candles)?;
        }
        let swings = self.swings(candles);
        Ok(self.scan_with_swings(candles, &swings))
    }

    /// Scan with precomputed swings.
    pub fn scan_with_swings<T: OHLCV>(&self, candles: &[T], swings: &Swings) -> Vec<Pattern> {
        let mut results = Vec::new();
        for detector in &self.detectors {
            if candles.len() >= detector.min_bars() {
                results.extend(detector.detect(candles, swings));
            }
        }
        results
    }

    /// Patterns that complete exactly on candle `index`.
    pub fn scan_completed_at<T: OHLCV>(
        &self,
        candles: &[T],
        swings: &Swings,
        index: usize,
    ) -> Vec<Pattern> {
        self.scan_with_swings(candles, swings)
            .into_iter()
            .filter(|p| p.completed_at() == index)
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for d in &self.detectors {
            d.validate_config()?;
        }
        Ok(())
    }
}

pub(crate) fn validate_bars<T: OHLCV>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| match e {
            Error::InvalidOHLCV { reason, .. } => Error::InvalidOHLCV { index: i, reason },
            other => other,
        })?;
    }
    Ok(())
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternScanner instances
#[derive(Debug, Default)]
pub struct ScannerBuilder {
    detectors: Vec<BuiltinDetector>,
    config: ScannerConfig,
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every builtin detector with default tolerances
    pub fn with_all_defaults(self) -> Self {
        self.with_reversal_defaults()
            .with_harmonic_defaults()
            .with_candlestick_defaults()
            .with_chart_defaults()
    }

    /// Engulfing and double top/bottom
    pub fn with_reversal_defaults(mut self) -> Self {
        self.detectors
            .extend(builtin_defaults![Engulfing, DoubleTopBottom]);
        self
    }

    /// AB=CD and Gartley
    pub fn with_harmonic_defaults(mut self) -> Self {
        self.detectors.extend(builtin_defaults![Abcd, Gartley]);
        self
    }

    pub fn with_candlestick_defaults(mut self) -> Self {
        self.detectors.extend(builtin_defaults![
            Hammer,
            MorningStar,
            PiercingLine,
            ThreeWhiteSoldiers,
        ]);
        self
    }

    pub fn with_chart_defaults(mut self) -> Self {
        self.detectors.extend(builtin_defaults![
            CupAndHandle,
            InverseHeadAndShoulders,
            FallingWedge,
            BullFlag,
            AscendingTriangle,
        ]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.detectors.push(detector);
        Ok(self)
    }

    pub fn swing_lookback(mut self, lookback: Period) -> Self {
        self.config.swing_lookback = lookback;
        self
    }

    /// Enable/disable data validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the scanner
    pub fn build(self) -> Result<PatternScanner> {
        let scanner = PatternScanner {
            detectors: self.detectors,
            config: self.config,
        };
        scanner.validate()?;
        Ok(scanner)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub patterns: Vec<Pattern>,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: Error,
}

/// Scan many instruments in parallel. Independent of the (sequential) backtest.
pub fn scan_parallel<'a, T, I>(
    scanner: &PatternScanner,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLCV + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            scanner
                .scan(bars)
                .map(|patterns| ScanResult {
                    symbol: symbol.to_string(),
                    patterns,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
