//! TradeEvent — a completed round-trip trade emitted by the simulator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Long,
    Short,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Timeout,
    Signal,
}

/// Indicator values observed at the entry signal bar, keyed by indicator
/// label (e.g. `rsi_14`). `BTreeMap` keeps serialization order deterministic.
pub type IndicatorSnapshot = BTreeMap<String, f64>;

/// A completed round-trip trade: created exactly once per Open→Flat
/// transition and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub entry_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_bar: usize,
    pub side: TradeSide,
    pub lot_size: f64,
    pub pnl: f64,
    /// PnL relative to required margin (`lot_size * entry_price / leverage`),
    /// not relative to notional.
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
    pub indicator_snapshot: IndicatorSnapshot,
}

impl TradeEvent {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}

/// Signed PnL for a closed trade.
pub fn trade_pnl(side: TradeSide, entry_price: f64, exit_price: f64, lot_size: f64) -> f64 {
    match side {
        TradeSide::Long => (exit_price - entry_price) * lot_size,
        TradeSide::Short => (entry_price - exit_price) * lot_size,
    }
}

/// PnL as a percentage of required margin.
pub fn pnl_percent(pnl: f64, entry_price: f64, lot_size: f64, leverage: f64) -> f64 {
    let margin = lot_size * entry_price / leverage;
    if margin <= 0.0 {
        return 0.0;
    }
    pnl / margin * 100.0
}
