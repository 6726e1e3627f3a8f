//! Position sizing and the pre-trade risk gate

use serde::{Deserialize, Serialize};

/// Risk multiplier for a confluence score: >85 scales up, >70 keeps base risk,
/// anything lower halves it.
pub fn confluence_multiplier(score: u8) -> f64 {
    if score > 85 {
        1.5
    } else if score > 70 {
        1.0
    } else {
        0.5
    }
}

/// `(equity * risk_pct / 100) / |entry - stop|`, rounded to 4 decimals.
/// Returns 0 when the stop distance is not positive.
pub fn position_size(equity: f64, risk_pct: f64, entry: f64, stop: f64) -> f64 {
    let distance = (entry - stop).abs();
    if !(distance > 0.0) {
        return 0.0;
    }
    let size = equity * risk_pct / 100.0 / distance;
    (size * 10_000.0).round() / 10_000.0
}

/// [`position_size`] with `base_risk_pct` scaled by the confluence tier.
pub fn calculate_position_size(
    equity: f64,
    base_risk_pct: f64,
    entry: f64,
    stop: f64,
    confluence_score: u8,
) -> f64 {
    let effective = base_risk_pct * confluence_multiplier(confluence_score);
    position_size(equity, effective, entry, stop)
}

/// Limits enforced before a new position is opened
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    pub max_open_positions: usize,
    /// Percent of equity all open positions may risk together
    pub max_concurrent_risk_pct: f64,
    /// Percent drop from the day's reference equity that halts new entries
    pub max_daily_drawdown_pct: f64,
}

/// Outcome of a gate check. Rejections are expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Accept,
    MaxOpenPositions { open: usize, limit: usize },
    DailyDrawdownBreached { equity: f64, floor: f64 },
    ConcurrentRiskExceeded { open_risk: f64, new_risk: f64, limit: f64 },
}

impl GateDecision {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept)
    }
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    limits: RiskLimits,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn daily_floor(&self, reference_equity: f64) -> f64 {
        reference_equity * (1.0 - self.limits.max_daily_drawdown_pct / 100.0)
    }

    /// Checks run before sizing: position count and the daily drawdown floor.
    pub fn check_new_entry(
        &self,
        open_positions: usize,
        equity: f64,
        reference_equity: f64,
    ) -> GateDecision {
        if open_positions >= self.limits.max_open_positions {
            return GateDecision::MaxOpenPositions {
                open: open_positions,
                limit: self.limits.max_open_positions,
            };
        }
        let floor = self.daily_floor(reference_equity);
        if equity < floor {
            return GateDecision::DailyDrawdownBreached { equity, floor };
        }
        GateDecision::Accept
    }

    /// Check run after sizing: total risk across open positions plus the new one.
    pub fn check_concurrent_risk(&self, open_risk: f64, new_risk: f64, equity: f64) -> GateDecision {
        let limit = equity * self.limits.max_concurrent_risk_pct / 100.0;
        if open_risk + new_risk > limit {
            return GateDecision::ConcurrentRiskExceeded {
                open_risk,
                new_risk,
                limit,
            };
        }
        GateDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RiskGate {
        RiskGate::new(RiskLimits {
            max_open_positions: 2,
            max_concurrent_risk_pct: 5.0,
            max_daily_drawdown_pct: 3.0,
        })
    }

    #[test]
    fn sizing_exact() {
        assert_eq!(position_size(100_000.0, 1.0, 150.0, 140.0), 100.0);
        assert_eq!(calculate_position_size(100_000.0, 1.0, 150.0, 140.0, 80), 100.0);
    }

    #[test]
    fn sizing_tiers() {
        assert_eq!(calculate_position_size(100_000.0, 1.0, 150.0, 140.0, 90), 150.0);
        assert_eq!(calculate_position_size(100_000.0, 1.0, 150.0, 140.0, 85), 100.0);
        assert_eq!(calculate_position_size(100_000.0, 1.0, 150.0, 140.0, 70), 50.0);
    }

    #[test]
    fn sizing_rounds_to_four_decimals() {
        assert_eq!(position_size(100_000.0, 1.0, 105.0, 102.0), 333.3333);
    }

    #[test]
    fn degenerate_stop_sizes_zero() {
        assert_eq!(position_size(100_000.0, 1.0, 100.0, 100.0), 0.0);
        assert_eq!(position_size(100_000.0, 1.0, 100.0, f64::NAN), 0.0);
    }

    #[test]
    fn gate_limits_open_positions() {
        assert_eq!(
            gate().check_new_entry(2, 100_000.0, 100_000.0),
            GateDecision::MaxOpenPositions { open: 2, limit: 2 }
        );
        assert!(gate().check_new_entry(1, 100_000.0, 100_000.0).is_accept());
    }

    #[test]
    fn gate_daily_drawdown() {
        let decision = gate().check_new_entry(0, 96_000.0, 100_000.0);
        assert!(matches!(decision, GateDecision::DailyDrawdownBreached { .. }));
        assert!(gate().check_new_entry(0, 97_500.0, 100_000.0).is_accept());
    }

    #[test]
    fn gate_concurrent_risk() {
        assert!(gate().check_concurrent_risk(3_000.0, 1_000.0, 100_000.0).is_accept());
        assert!(!gate().check_concurrent_risk(4_500.0, 1_000.0, 100_000.0).is_accept());
    }
}
