//! Trend regime from the last two swing highs and lows.

use serde::{Deserialize, Serialize};

use crate::{
    swing::{SwingPoint, Swings},
    Side,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Uptrend,
    Downtrend,
    #[default]
    Ranging,
}

impl MarketRegime {
    /// Higher high and higher low is an uptrend, lower high and lower low a
    /// downtrend. Everything else, ties and short histories included, is ranging.
    pub fn classify(highs: &[SwingPoint], lows: &[SwingPoint]) -> Self {
        let (Some([prev_high, last_high]), Some([prev_low, last_low])) =
            (last_two(highs), last_two(lows))
        else {
            return MarketRegime::Ranging;
        };

        if last_high.price > prev_high.price && last_low.price > prev_low.price {
            MarketRegime::Uptrend
        } else if last_high.price < prev_high.price && last_low.price < prev_low.price {
            MarketRegime::Downtrend
        } else {
            MarketRegime::Ranging
        }
    }

    pub fn from_swings(swings: &Swings) -> Self {
        Self::classify(&swings.highs, &swings.lows)
    }

    /// Longs trade with uptrends, shorts with downtrends
    pub fn aligns_with(self, side: Side) -> bool {
        matches!(
            (self, side),
            (MarketRegime::Uptrend, Side::Long) | (MarketRegime::Downtrend, Side::Short)
        )
    }
}

fn last_two(points: &[SwingPoint]) -> Option<[SwingPoint; 2]> {
    match points {
        [.., prev, last] => Some([*prev, *last]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highs(points: &[(usize, f64)]) -> Vec<SwingPoint> {
        points.iter().map(|&(i, p)| SwingPoint::high(i, p)).collect()
    }

    fn lows(points: &[(usize, f64)]) -> Vec<SwingPoint> {
        points.iter().map(|&(i, p)| SwingPoint::low(i, p)).collect()
    }

    #[test]
    fn uptrend() {
        let regime = MarketRegime::classify(
            &highs(&[(5, 110.0), (10, 120.0)]),
            &lows(&[(2, 100.0), (8, 105.0)]),
        );
        assert_eq!(regime, MarketRegime::Uptrend);
    }

    #[test]
    fn downtrend() {
        let regime = MarketRegime::classify(
            &highs(&[(5, 120.0), (10, 110.0)]),
            &lows(&[(2, 105.0), (8, 100.0)]),
        );
        assert_eq!(regime, MarketRegime::Downtrend);
    }

    #[test]
    fn equal_pair_is_ranging() {
        let regime = MarketRegime::classify(
            &highs(&[(5, 110.0), (10, 110.0)]),
            &lows(&[(2, 100.0), (8, 105.0)]),
        );
        assert_eq!(regime, MarketRegime::Ranging);
    }

    #[test]
    fn mixed_is_ranging() {
        let regime = MarketRegime::classify(
            &highs(&[(5, 110.0), (10, 120.0)]),
            &lows(&[(2, 105.0), (8, 100.0)]),
        );
        assert_eq!(regime, MarketRegime::Ranging);
    }

    #[test]
    fn too_few_points_is_ranging() {
        let regime =
            MarketRegime::classify(&highs(&[(5, 110.0)]), &lows(&[(2, 100.0), (8, 105.0)]));
        assert_eq!(regime, MarketRegime::Ranging);
        assert_eq!(MarketRegime::from_swings(&Swings::default()), MarketRegime::Ranging);
    }

    #[test]
    fn alignment() {
        assert!(MarketRegime::Uptrend.aligns_with(Side::Long));
        assert!(!MarketRegime::Uptrend.aligns_with(Side::Short));
        assert!(MarketRegime::Downtrend.aligns_with(Side::Short));
        assert!(!MarketRegime::Ranging.aligns_with(Side::Long));
    }
}
