//! Performance aggregation — pure functions from a trade list to statistics.
//!
//! `ResultSummary` is derived and recomputable at any time from its trade
//! list plus initial capital; it carries no state of its own.
//!
//! Classification rules:
//! - A trade is a win if `pnl > 0` and a loss if `pnl < 0`, regardless of
//!   exit reason, for counts and rates.
//! - Streak counters skip timeout exits entirely: a timeout neither extends
//!   nor resets a win/loss streak, but still counts toward totals.

use crate::domain::{ExitReason, TradeEvent};
use serde::{Deserialize, Serialize};

/// Profit factor with an explicit unbounded case.
///
/// Gross loss of zero with positive gross profit is "unbounded", modeled as
/// an enum variant rather than floating-point infinity, which serializes
/// poorly across transports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ProfitFactor {
    Finite(f64),
    Unbounded,
}

impl ProfitFactor {
    /// Numeric view for distribution statistics: `Unbounded` maps to `cap`.
    pub fn capped(&self, cap: f64) -> f64 {
        match self {
            ProfitFactor::Finite(v) => v.min(cap),
            ProfitFactor::Unbounded => cap,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, ProfitFactor::Unbounded)
    }
}

/// Aggregate statistics for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Trades closed by timeout (neither win nor loss for streaks).
    pub timeout_trades: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_profit: f64,
    pub profit_factor: ProfitFactor,
    pub average_win: f64,
    pub average_loss: f64,
    /// winRate × avgWin − (1 − winRate) × avgLoss.
    pub expectancy: f64,
    /// Largest peak-to-trough drop of the cumulative PnL curve, evaluated
    /// trade-by-trade. Reported as a non-negative magnitude.
    pub max_drawdown: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Capital the run started with; denominator for the rate views.
    pub initial_capital: f64,
}

impl ResultSummary {
    pub fn empty() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            timeout_trades: 0,
            win_rate: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            net_profit: 0.0,
            profit_factor: ProfitFactor::Finite(0.0),
            average_win: 0.0,
            average_loss: 0.0,
            expectancy: 0.0,
            max_drawdown: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            initial_capital: 0.0,
        }
    }

    /// Max drawdown as a fraction of initial capital.
    pub fn max_drawdown_rate(&self) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        self.max_drawdown / self.initial_capital
    }

    /// Net profit as a fraction of initial capital.
    pub fn net_profit_rate(&self) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        self.net_profit / self.initial_capital
    }
}

/// Compute the summary for a trade list.
///
/// Zero trades yield winRate 0 and profitFactor Finite(0), never NaN.
pub fn summarize(trades: &[TradeEvent], initial_capital: f64) -> ResultSummary {
    if trades.is_empty() {
        let mut summary = ResultSummary::empty();
        summary.initial_capital = initial_capital;
        return summary;
    }

    let mut summary = ResultSummary::empty();
    summary.initial_capital = initial_capital;
    summary.total_trades = trades.len();

    for trade in trades {
        if trade.is_winner() {
            summary.winning_trades += 1;
            summary.gross_profit += trade.pnl;
        } else if trade.is_loser() {
            summary.losing_trades += 1;
            summary.gross_loss += -trade.pnl;
        }
        if trade.exit_reason == ExitReason::Timeout {
            summary.timeout_trades += 1;
        }
        summary.net_profit += trade.pnl;
    }

    summary.win_rate = summary.winning_trades as f64 / summary.total_trades as f64;
    summary.profit_factor = profit_factor(summary.gross_profit, summary.gross_loss);
    summary.average_win = if summary.winning_trades > 0 {
        summary.gross_profit / summary.winning_trades as f64
    } else {
        0.0
    };
    summary.average_loss = if summary.losing_trades > 0 {
        summary.gross_loss / summary.losing_trades as f64
    } else {
        0.0
    };
    summary.expectancy = summary.win_rate * summary.average_win
        - (1.0 - summary.win_rate) * summary.average_loss;
    summary.max_drawdown = max_drawdown(trades);

    let (wins, losses) = streaks(trades);
    summary.max_consecutive_wins = wins;
    summary.max_consecutive_losses = losses;

    summary
}

fn profit_factor(gross_profit: f64, gross_loss: f64) -> ProfitFactor {
    if gross_loss == 0.0 {
        if gross_profit > 0.0 {
            ProfitFactor::Unbounded
        } else {
            ProfitFactor::Finite(0.0)
        }
    } else {
        ProfitFactor::Finite(gross_profit / gross_loss)
    }
}

/// Largest peak-to-trough drop of the cumulative PnL curve, trade-by-trade.
fn max_drawdown(trades: &[TradeEvent]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for trade in trades {
        cumulative += trade.pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = peak - cumulative;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Longest win and loss streaks. Timeout exits are skipped: they neither
/// extend nor reset a streak.
fn streaks(trades: &[TradeEvent]) -> (usize, usize) {
    let mut max_wins = 0;
    let mut max_losses = 0;
    let mut current_wins = 0;
    let mut current_losses = 0;

    for trade in trades {
        if trade.exit_reason == ExitReason::Timeout {
            continue;
        }
        if trade.is_winner() {
            current_wins += 1;
            current_losses = 0;
            max_wins = max_wins.max(current_wins);
        } else if trade.is_loser() {
            current_losses += 1;
            current_wins = 0;
            max_losses = max_losses.max(current_losses);
        }
    }
    (max_wins, max_losses)
}
