//! Integration tests for pattern detection through the public prelude.

use pivotbt::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        1000.0
    }
}

/// Eight flat bars shaped into an M: peaks at 2 and 6, neckline low at 4,
/// breakdown close on bar 7
fn double_top_bars() -> Vec<TestBar> {
    let mut bars = vec![TestBar::new(108.0, 112.0, 107.0, 108.0); 8];
    bars[2].h = 110.0;
    bars[4].l = 105.0;
    bars[6].h = 109.9;
    bars[7] = TestBar::new(108.0, 112.0, 103.0, 104.0);
    bars
}

/// Mirror W shape: troughs at 2 and 6, neckline high at 4, breakout close on bar 7
fn double_bottom_bars() -> Vec<TestBar> {
    let mut bars = vec![TestBar::new(102.0, 104.0, 101.0, 102.0); 8];
    bars[2].l = 100.0;
    bars[4].h = 105.0;
    bars[6].l = 100.1;
    bars[7] = TestBar::new(102.0, 107.0, 101.0, 106.0);
    bars
}

// ============================================================
// DOUBLE TOP / BOTTOM
// ============================================================

#[test]
fn test_double_top() {
    let swings = Swings::new(
        vec![SwingPoint::high(2, 110.0), SwingPoint::high(6, 109.9)],
        vec![SwingPoint::low(4, 105.0)],
        0,
    );
    let patterns = DoubleTopBottomDetector::with_defaults().detect(&double_top_bars(), &swings);

    assert_eq!(patterns.len(), 1);
    let pattern = &patterns[0];
    assert_eq!(pattern.name(), "Double Top");
    assert_eq!(pattern.side(), Side::Short);
    assert_eq!(pattern.invalidation_price(), 110.0);
    assert_eq!(pattern.completed_at(), 7);
    match pattern {
        Pattern::DoubleTop {
            neckline,
            breakout_index,
            ..
        } => {
            assert_eq!(neckline.price, 105.0);
            assert_eq!(*breakout_index, 7);
        }
        other => panic!("unexpected pattern {other:?}"),
    }
}

#[test]
fn test_double_bottom() {
    let swings = Swings::new(
        vec![SwingPoint::high(4, 105.0)],
        vec![SwingPoint::low(2, 100.0), SwingPoint::low(6, 100.1)],
        0,
    );
    let patterns =
        DoubleTopBottomDetector::with_defaults().detect(&double_bottom_bars(), &swings);

    assert_eq!(patterns.len(), 1);
    let pattern = &patterns[0];
    assert_eq!(pattern.name(), "Double Bottom");
    assert_eq!(pattern.side(), Side::Long);
    assert_eq!(pattern.invalidation_price(), 100.0);
    assert_eq!(pattern.completed_at(), 7);
}

#[test]
fn test_dissimilar_peaks_rejected() {
    let swings = Swings::new(
        vec![SwingPoint::high(2, 110.0), SwingPoint::high(6, 112.0)],
        vec![SwingPoint::low(4, 105.0)],
        0,
    );
    let patterns = DoubleTopBottomDetector::with_defaults().detect(&double_top_bars(), &swings);
    assert!(patterns.is_empty());
}

#[test]
fn test_neckline_confirmation_margin() {
    let swings = Swings::new(
        vec![SwingPoint::high(2, 110.0), SwingPoint::high(6, 109.9)],
        vec![SwingPoint::low(4, 105.0)],
        0,
    );
    // 104 is under 105 but not under 105 * (1 - 0.02)
    let strict = DoubleTopBottomDetector::new(
        Ratio::new(0.01).unwrap(),
        Ratio::new(0.02).unwrap(),
    );
    assert!(strict.detect(&double_top_bars(), &swings).is_empty());
}

#[test]
fn test_confirmation_waits_for_swing_lookback() {
    let swings = Swings::new(
        vec![SwingPoint::high(2, 110.0), SwingPoint::high(6, 109.9)],
        vec![SwingPoint::low(4, 105.0)],
        3,
    );
    let patterns = DoubleTopBottomDetector::with_defaults().detect(&double_top_bars(), &swings);
    // breakout on bar 7, second peak only provable on bar 9
    assert_eq!(patterns[0].completed_at(), 9);
}

// ============================================================
// ENGULFING
// ============================================================

#[test]
fn test_bullish_engulfing() {
    let bars = vec![
        TestBar::new(102.0, 102.5, 99.5, 100.0),
        TestBar::new(99.5, 103.5, 99.0, 103.0),
    ];
    let patterns = EngulfingDetector::with_defaults().detect(&bars, &Swings::default());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].bias(), Direction::Bullish);
    assert_eq!(patterns[0].invalidation_price(), 99.0);
}

#[test]
fn test_bearish_engulfing() {
    let bars = vec![
        TestBar::new(100.0, 102.5, 99.5, 102.0),
        TestBar::new(102.5, 103.0, 98.5, 99.0),
    ];
    let patterns = EngulfingDetector::with_defaults().detect(&bars, &Swings::default());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].name(), "Engulfing");
    assert_eq!(patterns[0].bias(), Direction::Bearish);
    assert_eq!(patterns[0].side(), Side::Short);
    match patterns[0] {
        Pattern::Engulfing {
            index, stop_loss, ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(stop_loss, 103.0);
        }
        ref other => panic!("unexpected pattern {other:?}"),
    }
}

#[test]
fn test_engulfing_requires_opposite_colours() {
    let bars = vec![
        TestBar::new(100.0, 102.5, 99.5, 102.0),
        TestBar::new(99.5, 104.0, 99.0, 103.5),
    ];
    assert!(EngulfingDetector::with_defaults()
        .detect(&bars, &Swings::default())
        .is_empty());
}

// ============================================================
// CANDLESTICK HEURISTICS
// ============================================================

#[test]
fn test_hammer() {
    let bars = vec![TestBar::new(100.0, 100.7, 98.0, 100.5)];
    let patterns = HammerDetector::with_defaults().detect(&bars, &Swings::default());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].name(), "Hammer");
    assert_eq!(patterns[0].invalidation_price(), 98.0);
}

#[test]
fn test_morning_star_and_three_soldiers() {
    let star = vec![
        TestBar::new(110.0, 110.5, 104.5, 105.0),
        TestBar::new(104.0, 105.0, 102.0, 104.2),
        TestBar::new(104.5, 109.0, 104.0, 108.5),
    ];
    let patterns = MorningStarDetector::with_defaults().detect(&star, &Swings::default());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].invalidation_price(), 102.0);

    let soldiers = vec![
        TestBar::new(100.0, 102.2, 99.8, 102.0),
        TestBar::new(101.0, 104.2, 100.8, 104.0),
        TestBar::new(103.0, 106.2, 102.8, 106.0),
    ];
    let patterns = ThreeWhiteSoldiersDetector::with_defaults().detect(&soldiers, &Swings::default());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].bias(), Direction::Bullish);
}

// ============================================================
// CHART HEURISTICS
// ============================================================

fn bull_flag_bars() -> Vec<TestBar> {
    let pole = (0..5).map(|i| {
        let open = 100.0 + 2.0 * i as f64;
        TestBar::new(open, open + 2.5, open - 0.5, open + 2.0)
    });
    let flag = (0..5).map(|j| {
        let low = 108.5 - 0.3 * j as f64;
        TestBar::new(low + 0.7, low + 1.0, low, low + 0.3)
    });
    pole.chain(flag).collect()
}

fn ascending_triangle_bars() -> Vec<TestBar> {
    let mut bars: Vec<TestBar> = (0..20)
        .map(|i| {
            let low = 100.0 + 0.2 * i as f64;
            TestBar::new(low + 1.0, 110.0, low, low + 2.0)
        })
        .collect();
    bars.push(TestBar::new(106.0, 111.5, 105.0, 111.0));
    bars
}

#[test]
fn test_bull_flag() {
    let bars = bull_flag_bars();
    let patterns = BullFlagDetector::with_defaults().detect(&bars, &Swings::default());
    assert_eq!(patterns.len(), 1);
    match patterns[0] {
        Pattern::Chart {
            kind: ChartKind::BullFlag,
            start_index,
            index,
            stop_loss,
        } => {
            assert_eq!((start_index, index), (0, 9));
            assert!((stop_loss - 107.3).abs() < 1e-9);
        }
        ref other => panic!("unexpected pattern {other:?}"),
    }
}

#[test]
fn test_ascending_triangle() {
    let bars = ascending_triangle_bars();
    let patterns = AscendingTriangleDetector::with_defaults().detect(&bars, &Swings::default());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].completed_at(), 20);
    assert!((patterns[0].invalidation_price() - 102.0).abs() < 1e-9);
}

#[test]
fn test_chart_preset_through_scanner() {
    let scanner = ScannerBuilder::new().with_chart_defaults().build().unwrap();
    let patterns = scanner.scan(&ascending_triangle_bars()).unwrap();
    assert!(patterns.iter().any(|p| matches!(
        p,
        Pattern::Chart {
            kind: ChartKind::AscendingTriangle,
            ..
        }
    )));
}

// ============================================================
// SCANNER
// ============================================================

#[test]
fn test_scanner_swings_on_real_series() {
    // single peak at 5 with a 2-bar lookback
    let highs = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0, 104.0, 103.0, 102.0];
    let bars: Vec<TestBar> = highs
        .iter()
        .map(|&h| TestBar::new(h - 2.0, h, h - 3.0, h - 1.0))
        .collect();
    let scanner = ScannerBuilder::new()
        .swing_lookback(Period::new(2).unwrap())
        .build()
        .unwrap();
    let swings = scanner.swings(&bars);
    assert_eq!(swings.highs, vec![SwingPoint::high(5, 110.0)]);
    assert_eq!(swings.confirmed_at(5), 7);
}

#[test]
fn test_scan_rejects_invalid_bars() {
    let bars = vec![TestBar::new(98.0, 97.0, 99.0, 98.0)];
    let scanner = ScannerBuilder::new()
        .with_all_defaults()
        .validate_data(true)
        .build()
        .unwrap();
    assert!(matches!(
        scanner.scan(&bars),
        Err(Error::InvalidOHLCV { index: 0, .. })
    ));
}

#[test]
fn test_helpers_reachable_by_path() {
    use pivotbt::detectors::helpers::{highest_high, lowest_low, relative_diff};

    let bars = ascending_triangle_bars();
    assert_eq!(highest_high(&bars), 111.5);
    assert_eq!(lowest_low(&bars), 100.0);
    assert!((relative_diff(110.0, 109.9) - 0.1 / 110.0).abs() < 1e-12);
}
