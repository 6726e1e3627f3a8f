//! Harmonic pattern detectors: AB=CD and Gartley
//!
//! Both work purely on swing points; candles are ignored.

use super::helpers::{
    in_band, near, ABCD_MAX_RETRACEMENT, ABCD_MIN_RETRACEMENT, GARTLEY_B_RETRACEMENT,
    GARTLEY_D_RETRACEMENT, GARTLEY_MAX_CD_BC, GARTLEY_MIN_CD_BC,
};
use crate::{
    swing::{SwingKind, SwingPoint, Swings},
    Direction, Error, Pattern, PatternDetector, PatternId, Ratio, Result, OHLCV,
};

impl_with_defaults!(AbcdDetector, GartleyDetector);

// ============================================================
// AB=CD
// ============================================================

/// AB=CD: A and C are consecutive same-type swings, B the opposite swing between
/// them. D is projected so that CD repeats AB in price and bar count.
#[derive(Debug, Clone)]
pub struct AbcdDetector {
    /// Accepted band for `BC / AB`
    pub min_retracement: f64,
    pub max_retracement: f64,
    /// Max relative difference between the BC and AB bar counts, off when None
    pub time_symmetry_tolerance: Option<Ratio>,
}

impl Default for AbcdDetector {
    fn default() -> Self {
        Self {
            min_retracement: ABCD_MIN_RETRACEMENT,
            max_retracement: ABCD_MAX_RETRACEMENT,
            time_symmetry_tolerance: None,
        }
    }
}

impl AbcdDetector {
    pub fn with_time_symmetry(mut self, tolerance: Ratio) -> Self {
        self.time_symmetry_tolerance = Some(tolerance);
        self
    }

    /// All AB=CD instances in `swings`, bullish first
    pub fn find(&self, swings: &Swings) -> Vec<Pattern> {
        let mut out = Vec::new();
        self.scan_side(&swings.lows, &swings.highs, Direction::Bullish, swings, &mut out);
        self.scan_side(&swings.highs, &swings.lows, Direction::Bearish, swings, &mut out);
        out
    }

    fn scan_side(
        &self,
        outer: &[SwingPoint],
        inner: &[SwingPoint],
        bias: Direction,
        swings: &Swings,
        out: &mut Vec<Pattern>,
    ) {
        // +1 when prices rise from A to B
        let sign = if bias.is_bullish() { 1.0 } else { -1.0 };

        for pair in outer.windows(2) {
            let (a, c) = (pair[0], pair[1]);
            if sign * (c.price - a.price) <= 0.0 {
                continue;
            }
            for &b in inner.iter().filter(|b| a.index < b.index && b.index < c.index) {
                let ab = sign * (b.price - a.price);
                if ab <= 0.0 {
                    continue;
                }
                let bc = sign * (b.price - c.price);
                if !in_band(bc / ab, self.min_retracement, self.max_retracement) {
                    continue;
                }
                if !self.time_symmetric(a, b, c) {
                    continue;
                }

                let d = SwingPoint {
                    index: c.index + (b.index - a.index),
                    price: c.price + sign * ab,
                    kind: b.kind,
                };
                out.push(Pattern::Abcd {
                    a,
                    b,
                    c,
                    d,
                    bias,
                    confirmed_at: swings.confirmed_at(c.index),
                });
            }
        }
    }

    fn time_symmetric(&self, a: SwingPoint, b: SwingPoint, c: SwingPoint) -> bool {
        let Some(tolerance) = self.time_symmetry_tolerance else {
            return true;
        };
        let ab_bars = (b.index - a.index) as f64;
        let bc_bars = (c.index - b.index) as f64;
        (bc_bars - ab_bars).abs() / ab_bars <= tolerance.get()
    }
}

impl PatternDetector for AbcdDetector {
    fn id(&self) -> PatternId {
        PatternId("ABCD")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: OHLCV>(&self, _candles: &[T], swings: &Swings) -> Vec<Pattern> {
        self.find(swings)
    }

    fn validate_config(&self) -> Result<()> {
        let (lo, hi) = (self.min_retracement, self.max_retracement);
        if !(lo.is_finite() && hi.is_finite() && 0.0 < lo && lo <= hi) {
            return Err(Error::InvalidConfig(format!(
                "AB=CD retracement band [{lo}, {hi}] must be finite, positive and ordered"
            )));
        }
        Ok(())
    }
}

// ============================================================
// GARTLEY
// ============================================================

/// Gartley "222" over five consecutive alternating swings X-A-B-C-D.
#[derive(Debug, Clone)]
pub struct GartleyDetector {
    /// Allowed deviation of the B retracement from 0.618
    pub b_point_tolerance: Ratio,
    /// Allowed deviation of the D retracement from 0.786
    pub d_point_tolerance: Ratio,
}

impl Default for GartleyDetector {
    fn default() -> Self {
        Self {
            b_point_tolerance: Ratio::new_const(0.05),
            d_point_tolerance: Ratio::new_const(0.05),
        }
    }
}

impl GartleyDetector {
    pub fn new(b_point_tolerance: Ratio, d_point_tolerance: Ratio) -> Self {
        Self {
            b_point_tolerance,
            d_point_tolerance,
        }
    }

    pub fn find(&self, swings: &Swings) -> Vec<Pattern> {
        let merged = swings.merged();
        let mut bullish = Vec::new();
        let mut bearish = Vec::new();

        for run in merged.windows(5) {
            let [x, a, b, c, d] = [run[0], run[1], run[2], run[3], run[4]];
            let bias = match x.kind {
                SwingKind::Low => Direction::Bullish,
                SwingKind::High => Direction::Bearish,
            };
            if !alternates(&[x, a, b, c, d]) || !self.ratios_hold(x, a, b, c, d, bias) {
                continue;
            }
            let pattern = Pattern::Gartley {
                x,
                a,
                b,
                c,
                d,
                bias,
                confirmed_at: swings.confirmed_at(d.index),
            };
            match bias {
                Direction::Bullish => bullish.push(pattern),
                Direction::Bearish => bearish.push(pattern),
            }
        }

        bullish.extend(bearish);
        bullish
    }

    fn ratios_hold(
        &self,
        x: SwingPoint,
        a: SwingPoint,
        b: SwingPoint,
        c: SwingPoint,
        d: SwingPoint,
        bias: Direction,
    ) -> bool {
        let sign = if bias.is_bullish() { 1.0 } else { -1.0 };
        let xa = sign * (a.price - x.price);
        let bc = sign * (c.price - b.price);
        if xa <= 0.0 || bc <= 0.0 {
            return false;
        }

        let b_retracement = sign * (a.price - b.price) / xa;
        if !near(
            b_retracement,
            GARTLEY_B_RETRACEMENT,
            self.b_point_tolerance.get(),
        ) {
            return false;
        }

        let d_retracement = sign * (a.price - d.price) / xa;
        if !near(
            d_retracement,
            GARTLEY_D_RETRACEMENT,
            self.d_point_tolerance.get(),
        ) {
            return false;
        }

        let cd = sign * (c.price - d.price);
        in_band(cd / bc, GARTLEY_MIN_CD_BC, GARTLEY_MAX_CD_BC)
    }
}

fn alternates(points: &[SwingPoint]) -> bool {
    points.windows(2).all(|w| w[0].kind != w[1].kind)
}

impl PatternDetector for GartleyDetector {
    fn id(&self) -> PatternId {
        PatternId("GARTLEY")
    }

    fn min_bars(&self) -> usize {
        5
    }

    fn detect<T: OHLCV>(&self, _candles: &[T], swings: &Swings) -> Vec<Pattern> {
        self.find(swings)
    }
}
