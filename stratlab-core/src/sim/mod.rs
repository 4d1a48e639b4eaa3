//! Position simulator — single-position state machine over a bar series.
//!
//! Two states, Flat and Open, driven by a strictly sequential per-bar loop:
//!
//! - **Flat → Open**: entry trigger fires at bar `i` and bar `i + 1` exists →
//!   fill at bar `i + 1`'s open. The next-bar-open fill is what prevents
//!   look-ahead bias; it must never be changed to a same-bar close fill.
//! - **Open → Flat**: from the bar after entry, exits are checked in fixed
//!   priority: take-profit, then stop-loss, then timeout. TP/SL fill at the
//!   threshold price (limit fill); timeout fills at the bar close.
//!
//! A running capital counter accumulates realized PnL. When it reaches the
//! capital floor the run halts before any further entry — a ruined account
//! cannot open new positions. An open position at end of data is force-closed
//! at the last bar's close.

mod trigger;

pub use trigger::{ConditionTrigger, EntryTrigger, RandomTrigger};

use crate::domain::{
    pnl_percent, trade_pnl, Bar, ExitReason, IndicatorSnapshot, TradeEvent, TradeSide,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Conservative fixed warm-up, matching the slowest common indicator window.
pub const DEFAULT_WARMUP_BARS: usize = 50;

/// Fraction of initial capital below which the run halts.
pub const DEFAULT_CAPITAL_FLOOR_FRACTION: f64 = 0.5;

/// Pip-size heuristic cutoff: instruments priced above this use 0.01 pips.
pub const PIP_PRICE_CUTOFF: f64 = 50.0;
pub const PIP_HIGH_PRICED: f64 = 0.01;
pub const PIP_LOW_PRICED: f64 = 0.0001;

/// Minimum meaningful price increment for an instrument, inferred from its
/// price magnitude. High-priced instruments (indices, JPY pairs) quote in
/// hundredths; low-priced ones (major FX pairs) in ten-thousandths.
pub fn pip_size(price: f64) -> f64 {
    if price > PIP_PRICE_CUTOFF {
        PIP_HIGH_PRICED
    } else {
        PIP_LOW_PRICED
    }
}

/// TP/SL distance from the entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum PriceOffset {
    /// Percentage of the entry price.
    Percent(f64),
    /// Fixed pip count; pip size follows [`pip_size`].
    Pips(f64),
}

impl PriceOffset {
    /// Absolute price distance for an entry at `entry_price`.
    pub fn distance(&self, entry_price: f64) -> f64 {
        match self {
            PriceOffset::Percent(pct) => entry_price * pct / 100.0,
            PriceOffset::Pips(pips) => pips * pip_size(entry_price),
        }
    }
}

/// Simulation parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub side: TradeSide,
    pub take_profit: PriceOffset,
    pub stop_loss: PriceOffset,
    /// Maximum holding time in bars before a timeout exit.
    pub timeout_bars: usize,
    pub lot_size: f64,
    pub leverage: f64,
    pub initial_capital: f64,
    pub warmup_bars: usize,
    pub capital_floor_fraction: f64,
}

impl SimConfig {
    pub fn new(
        side: TradeSide,
        take_profit: PriceOffset,
        stop_loss: PriceOffset,
        timeout_bars: usize,
    ) -> Self {
        Self {
            side,
            take_profit,
            stop_loss,
            timeout_bars,
            lot_size: 10_000.0,
            leverage: 100.0,
            initial_capital: 1_000_000.0,
            warmup_bars: DEFAULT_WARMUP_BARS,
            capital_floor_fraction: DEFAULT_CAPITAL_FLOOR_FRACTION,
        }
    }

    fn capital_floor(&self) -> f64 {
        self.initial_capital * self.capital_floor_fraction
    }
}

/// How the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppedReason {
    /// The bar series was exhausted normally.
    EndOfData,
    /// Running capital fell to or below the capital floor.
    Bankruptcy,
}

/// Everything one simulation run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimOutcome {
    pub trades: Vec<TradeEvent>,
    pub stopped_reason: StoppedReason,
    /// Running capital when the simulation ended or halted.
    pub final_capital: f64,
}

struct OpenPosition {
    entry_bar: usize,
    entry_time: NaiveDateTime,
    entry_price: f64,
    tp_price: f64,
    sl_price: f64,
    snapshot: IndicatorSnapshot,
}

/// Walk the bar series and emit one `TradeEvent` per closed position.
///
/// A series shorter than the warm-up window produces zero trades — a valid,
/// uninteresting result, never an error.
pub fn simulate(bars: &[Bar], config: &SimConfig, trigger: &mut dyn EntryTrigger) -> SimOutcome {
    let mut trades: Vec<TradeEvent> = Vec::new();
    let mut capital = config.initial_capital;
    let floor = config.capital_floor();
    let mut position: Option<OpenPosition> = None;

    for i in config.warmup_bars..bars.len() {
        if let Some(pos) = &position {
            // Exits are only checked on bars after the entry bar.
            if i > pos.entry_bar {
                if let Some((exit_price, reason)) = check_exit(&bars[i], pos, config, i) {
                    let trade = close_position(
                        position.take().expect("position checked above"),
                        &bars[i],
                        i,
                        exit_price,
                        reason,
                        config,
                    );
                    capital += trade.pnl;
                    trades.push(trade);
                    if capital <= floor {
                        return SimOutcome {
                            trades,
                            stopped_reason: StoppedReason::Bankruptcy,
                            final_capital: capital,
                        };
                    }
                }
            }
        } else {
            // The floor check runs strictly before the entry check: a ruined
            // account cannot open new positions.
            if capital <= floor {
                return SimOutcome {
                    trades,
                    stopped_reason: StoppedReason::Bankruptcy,
                    final_capital: capital,
                };
            }
            if trigger.should_enter(i) && i + 1 < bars.len() {
                let entry_price = bars[i + 1].open;
                let tp = config.take_profit.distance(entry_price);
                let sl = config.stop_loss.distance(entry_price);
                let (tp_price, sl_price) = match config.side {
                    TradeSide::Long => (entry_price + tp, entry_price - sl),
                    TradeSide::Short => (entry_price - tp, entry_price + sl),
                };
                position = Some(OpenPosition {
                    entry_bar: i + 1,
                    entry_time: bars[i + 1].timestamp,
                    entry_price,
                    tp_price,
                    sl_price,
                    snapshot: trigger.snapshot(i),
                });
            }
        }
    }

    // Force-close a dangling position at the last bar's close.
    if let Some(pos) = position.take() {
        let last_index = bars.len() - 1;
        let last = &bars[last_index];
        let trade = close_position(pos, last, last_index, last.close, ExitReason::Timeout, config);
        capital += trade.pnl;
        trades.push(trade);
        if capital <= floor {
            return SimOutcome {
                trades,
                stopped_reason: StoppedReason::Bankruptcy,
                final_capital: capital,
            };
        }
    }

    SimOutcome {
        trades,
        stopped_reason: StoppedReason::EndOfData,
        final_capital: capital,
    }
}

/// Exit check in fixed priority order: TP, then SL, then timeout.
fn check_exit(
    bar: &Bar,
    pos: &OpenPosition,
    config: &SimConfig,
    index: usize,
) -> Option<(f64, ExitReason)> {
    match config.side {
        TradeSide::Long => {
            if bar.high >= pos.tp_price {
                return Some((pos.tp_price, ExitReason::TakeProfit));
            }
            if bar.low <= pos.sl_price {
                return Some((pos.sl_price, ExitReason::StopLoss));
            }
        }
        TradeSide::Short => {
            if bar.low <= pos.tp_price {
                return Some((pos.tp_price, ExitReason::TakeProfit));
            }
            if bar.high >= pos.sl_price {
                return Some((pos.sl_price, ExitReason::StopLoss));
            }
        }
    }
    if index - pos.entry_bar >= config.timeout_bars {
        return Some((bar.close, ExitReason::Timeout));
    }
    None
}

fn close_position(
    pos: OpenPosition,
    exit_bar: &Bar,
    exit_index: usize,
    exit_price: f64,
    reason: ExitReason,
    config: &SimConfig,
) -> TradeEvent {
    let pnl = trade_pnl(config.side, pos.entry_price, exit_price, config.lot_size);
    TradeEvent {
        entry_time: pos.entry_time,
        entry_price: pos.entry_price,
        entry_bar: pos.entry_bar,
        exit_time: exit_bar.timestamp,
        exit_price,
        exit_bar: exit_index,
        side: config.side,
        lot_size: config.lot_size,
        pnl,
        pnl_percent: pnl_percent(pnl, pos.entry_price, config.lot_size, config.leverage),
        exit_reason: reason,
        indicator_snapshot: pos.snapshot,
    }
}
