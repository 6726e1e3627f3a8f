//! Simulated account: positions, trade ledger and equity curve.
//!
//! The account has a single writer, the backtest loop. Positions are keyed by
//! instrument in a `BTreeMap` so iteration order is deterministic.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// One ledger row. `pnl` is set exactly when the trade is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub instrument: String,
    pub direction: Side,
    pub pattern_name: String,
    pub entry_timestamp: DateTime<Utc>,
    /// Volume-weighted average fill across the entry and any add-ons
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub size: f64,
    pub status: TradeStatus,
    pub exit_timestamp: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
}

impl Trade {
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Gross pnl of closing the whole trade at `price`
    #[inline]
    pub fn pnl_at(&self, price: f64) -> f64 {
        self.direction.sign() * (price - self.entry_price) * self.size
    }
}

/// Live exposure on one instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub instrument: String,
    pub direction: Side,
    pub size: f64,
    pub average_entry_price: f64,
    pub unrealized_pnl: f64,
    /// Per-share distance between the first fill and the original stop
    pub initial_risk: f64,
    pub trailing_active: bool,
    pub add_ons: usize,
    trade_index: usize,
}

impl Position {
    fn mark(&mut self, price: f64) {
        self.unrealized_pnl = self.direction.sign() * (price - self.average_entry_price) * self.size;
    }
}

/// One equity snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Realized equity plus unrealized pnl of open positions
    pub equity: f64,
}

/// Fill details for opening a position
#[derive(Debug, Clone)]
pub struct EntryFill<'a> {
    pub instrument: &'a str,
    pub direction: Side,
    pub pattern_name: &'a str,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
    pub stop_loss_price: f64,
    pub commission: f64,
}

#[derive(Debug, Clone)]
pub struct Account {
    initial_equity: f64,
    equity: f64,
    positions: BTreeMap<String, Position>,
    trade_history: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    next_trade_id: u64,
}

impl Account {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            equity: initial_equity,
            positions: BTreeMap::new(),
            trade_history: Vec::new(),
            equity_curve: Vec::new(),
            next_trade_id: 1,
        }
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    /// Realized equity: initial equity plus closed pnl minus commissions
    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn trade_history(&self) -> &[Trade] {
        &self.trade_history
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// The open trade backing `instrument`'s position
    pub fn open_trade(&self, instrument: &str) -> Option<&Trade> {
        let position = self.positions.get(instrument)?;
        self.trade_history.get(position.trade_index)
    }

    pub fn stop_loss(&self, instrument: &str) -> Option<f64> {
        self.open_trade(instrument).map(|t| t.stop_loss_price)
    }

    /// Sum of `size * |average entry - stop|` over open positions
    pub fn open_risk(&self) -> f64 {
        self.positions
            .values()
            .map(|p| {
                let stop = self.trade_history[p.trade_index].stop_loss_price;
                p.size * (p.average_entry_price - stop).abs()
            })
            .sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Open a new position and its trade row. Returns the trade id.
    pub fn open_position(&mut self, fill: EntryFill<'_>) -> Result<u64> {
        if self.positions.contains_key(fill.instrument) {
            return Err(Error::InvalidValue("position already open for instrument"));
        }
        if !(fill.size > 0.0) {
            return Err(Error::InvalidValue("position size must be > 0"));
        }

        let id = self.next_trade_id;
        self.next_trade_id += 1;
        self.equity -= fill.commission;

        self.trade_history.push(Trade {
            id,
            instrument: fill.instrument.to_string(),
            direction: fill.direction,
            pattern_name: fill.pattern_name.to_string(),
            entry_timestamp: fill.timestamp,
            entry_price: fill.price,
            stop_loss_price: fill.stop_loss_price,
            size: fill.size,
            status: TradeStatus::Open,
            exit_timestamp: None,
            exit_price: None,
            pnl: None,
        });
        self.positions.insert(
            fill.instrument.to_string(),
            Position {
                instrument: fill.instrument.to_string(),
                direction: fill.direction,
                size: fill.size,
                average_entry_price: fill.price,
                unrealized_pnl: 0.0,
                initial_risk: (fill.price - fill.stop_loss_price).abs(),
                trailing_active: false,
                add_ons: 0,
                trade_index: self.trade_history.len() - 1,
            },
        );
        Ok(id)
    }

    /// Grow an open position, recomputing the volume-weighted average entry.
    /// The stop may only tighten.
    pub fn add_to_position(
        &mut self,
        instrument: &str,
        price: f64,
        size: f64,
        stop_loss_price: f64,
        commission: f64,
    ) -> Result<()> {
        if !(size > 0.0) {
            return Err(Error::InvalidValue("add-on size must be > 0"));
        }
        let position = self
            .positions
            .get_mut(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.to_string()))?;

        let total = position.size + size;
        position.average_entry_price =
            (position.average_entry_price * position.size + price * size) / total;
        position.size = total;
        position.add_ons += 1;

        let trade = &mut self.trade_history[position.trade_index];
        trade.size = total;
        trade.entry_price = position.average_entry_price;
        trade.stop_loss_price = tighter(position.direction, trade.stop_loss_price, stop_loss_price);

        self.equity -= commission;
        Ok(())
    }

    /// Move the stop to `candidate` if that is favourable. Returns whether it moved.
    pub fn ratchet_stop(&mut self, instrument: &str, candidate: f64) -> Result<bool> {
        let position = self
            .positions
            .get(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.to_string()))?;
        let trade = &mut self.trade_history[position.trade_index];
        let next = tighter(position.direction, trade.stop_loss_price, candidate);
        let moved = next != trade.stop_loss_price;
        trade.stop_loss_price = next;
        Ok(moved)
    }

    pub fn activate_trailing(&mut self, instrument: &str) -> Result<()> {
        self.positions
            .get_mut(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.to_string()))?
            .trailing_active = true;
        Ok(())
    }

    /// Close the position at `price`, book pnl into equity and return it.
    pub fn close_position(
        &mut self,
        instrument: &str,
        timestamp: DateTime<Utc>,
        price: f64,
    ) -> Result<f64> {
        let position = self
            .positions
            .remove(instrument)
            .ok_or_else(|| Error::NoOpenPosition(instrument.to_string()))?;
        let trade = &mut self.trade_history[position.trade_index];

        let pnl = trade.pnl_at(price);
        trade.status = TradeStatus::Closed;
        trade.exit_timestamp = Some(timestamp);
        trade.exit_price = Some(price);
        trade.pnl = Some(pnl);

        self.equity += pnl;
        Ok(pnl)
    }

    /// Update an open position's unrealized pnl from the latest price.
    pub fn mark(&mut self, instrument: &str, price: f64) {
        if let Some(position) = self.positions.get_mut(instrument) {
            position.mark(price);
        }
    }

    /// Append a mark-to-market snapshot. Timestamps must not go backwards.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>) -> Result<EquityPoint> {
        if let Some(last) = self.equity_curve.last() {
            if timestamp < last.timestamp {
                return Err(Error::InvalidValue("equity curve timestamps must not decrease"));
            }
        }
        let point = EquityPoint {
            timestamp,
            equity: self.equity + self.unrealized_pnl(),
        };
        self.equity_curve.push(point);
        Ok(point)
    }

    pub(crate) fn into_parts(self) -> (Vec<Trade>, Vec<EquityPoint>, Vec<Position>) {
        (
            self.trade_history,
            self.equity_curve,
            self.positions.into_values().collect(),
        )
    }
}

/// The more protective of two stops for `side`
fn tighter(side: Side, current: f64, candidate: f64) -> f64 {
    match side {
        Side::Long => current.max(candidate),
        Side::Short => current.min(candidate),
    }
}
