//! Performance summary over a trade ledger and equity curve
//!
//! Pure numbers only. Rendering them is left to the caller.

use serde::{Deserialize, Serialize};

use crate::account::{EquityPoint, Trade};

/// Stand-in for an unbounded ratio when there are no losing trades
pub const NO_LOSS_SENTINEL: f64 = 999.0;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub net_pnl: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of closed trades with positive pnl
    pub win_rate: f64,
    pub gross_profit: f64,
    /// Absolute sum of losing pnl
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub average_win_loss_ratio: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough fall as a fraction of the peak
    pub max_drawdown: f64,
}

impl PerformanceSummary {
    /// Summarize closed trades and the equity curve. `annualization` scales the
    /// per-point Sharpe by its square root.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_equity: f64,
        annualization: Option<f64>,
    ) -> Self {
        let pnls: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();

        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum::<f64>().abs();

        let average_win = mean(&wins);
        let average_loss = if losses.is_empty() {
            0.0
        } else {
            gross_loss / losses.len() as f64
        };

        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_equity);

        Self {
            initial_equity,
            final_equity,
            net_pnl: final_equity - initial_equity,
            total_trades: pnls.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: if pnls.is_empty() {
                0.0
            } else {
                wins.len() as f64 / pnls.len() as f64 * 100.0
            },
            gross_profit,
            gross_loss,
            profit_factor: ratio_or_sentinel(gross_profit, gross_loss),
            average_win,
            average_loss,
            average_win_loss_ratio: ratio_or_sentinel(average_win, average_loss),
            sharpe_ratio: sharpe_ratio(equity_curve, annualization),
            max_drawdown: max_drawdown(equity_curve),
        }
    }
}

fn ratio_or_sentinel(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        NO_LOSS_SENTINEL
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Mean over sample standard deviation of per-point returns.
/// Zero with fewer than two returns or a flat curve.
pub fn sharpe_ratio(equity_curve: &[EquityPoint], annualization: Option<f64>) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|pair| pair[0].equity > 0.0)
        .map(|pair| pair[1].equity / pair[0].equity - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = mean(&returns);
    let var = returns
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / (returns.len() as f64 - 1.0);
    let std = var.sqrt();
    if std == 0.0 {
        return 0.0;
    }

    let sharpe = mean / std;
    match annualization {
        Some(periods) => sharpe * periods.sqrt(),
        None => sharpe,
    }
}

/// Largest fall from the running peak, as a fraction of that peak
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak);
        }
    }
    worst
}
