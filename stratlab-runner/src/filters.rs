//! Filter analysis — post-hoc indicator filters over completed trades.
//!
//! Every trade carries the indicator values observed at its entry bar.
//! Analysis measures, per indicator, how far winner and loser averages
//! separate, and suggests a threshold filter at the midpoint. Verification
//! replays the already-closed trade list against a chosen filter set and
//! re-aggregates: filters only ever subtract trades from a finished run,
//! they never re-enter the simulator, so verification is cheap and
//! side-effect-free.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::{summarize, CompareOp, IndicatorSnapshot, ResultSummary, TradeEvent};

use crate::monte_carlo::PROFIT_FACTOR_CAP;

/// Maximum filters per verification request.
pub const MAX_FILTERS: usize = 5;

/// Errors from filter analysis.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("{0} filters exceed the maximum of {MAX_FILTERS}")]
    TooManyFilters(usize),
}

/// A threshold rule over one entry-snapshot indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub indicator_key: String,
    pub op: CompareOp,
    pub threshold: f64,
}

impl FilterCondition {
    /// Whether a trade's entry snapshot passes this filter.
    ///
    /// A snapshot missing the indicator fails: a filter the trade cannot be
    /// checked against must not silently keep it.
    pub fn matches(&self, snapshot: &IndicatorSnapshot) -> bool {
        snapshot
            .get(&self.indicator_key)
            .is_some_and(|&value| self.op.apply(value, self.threshold))
    }
}

/// Per-indicator separation between winners and losers.
///
/// Derived and read-only; recomputed per analysis request, never stored as
/// strategy state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCandidate {
    pub indicator_key: String,
    pub win_average: f64,
    pub lose_average: f64,
    /// Normalized absolute separation, 0-100.
    pub significance_score: f64,
    /// Midpoint-threshold rule keeping the winner side of the separation.
    pub suggested: FilterCondition,
}

/// Before/after comparison of one verification pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterVerification {
    pub before: ResultSummary,
    pub after: ResultSummary,
    pub win_rate_delta: f64,
    /// Delta of profit factors with `Unbounded` capped, so the number stays
    /// finite and serializable.
    pub profit_factor_delta: f64,
    pub net_profit_delta: f64,
    pub filtered_out_trade_count: usize,
}

// ─── Analysis ────────────────────────────────────────────────────────

/// Rank candidate filters by how well each indicator separates winners
/// from losers. Indicators seen only on one side produce no candidate.
pub fn analyze(trades: &[TradeEvent]) -> Vec<FilterCandidate> {
    let mut win_values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut lose_values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for trade in trades {
        let side = if trade.is_winner() {
            &mut win_values
        } else if trade.is_loser() {
            &mut lose_values
        } else {
            continue;
        };
        for (key, &value) in &trade.indicator_snapshot {
            side.entry(key.as_str()).or_default().push(value);
        }
    }

    let mut candidates: Vec<FilterCandidate> = win_values
        .iter()
        .filter_map(|(key, wins)| {
            let losses = lose_values.get(key)?;
            let win_average = mean(wins);
            let lose_average = mean(losses);
            let significance_score = significance(win_average, lose_average);
            let op = if win_average > lose_average {
                CompareOp::Gt
            } else {
                CompareOp::Lt
            };
            Some(FilterCandidate {
                indicator_key: key.to_string(),
                win_average,
                lose_average,
                significance_score,
                suggested: FilterCondition {
                    indicator_key: key.to_string(),
                    op,
                    threshold: (win_average + lose_average) / 2.0,
                },
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.significance_score
            .partial_cmp(&a.significance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

/// Normalized absolute separation between the two averages, 0-100.
fn significance(win_average: f64, lose_average: f64) -> f64 {
    let scale = (win_average.abs() + lose_average.abs()) / 2.0;
    if scale == 0.0 {
        return 0.0;
    }
    ((win_average - lose_average).abs() / scale * 100.0).min(100.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// ─── Verification ────────────────────────────────────────────────────

/// Replay a closed trade list against a filter set and re-aggregate.
///
/// Filters combine with logical AND. Zero filters is allowed and yields
/// `after` identical to `before`.
pub fn verify(
    trades: &[TradeEvent],
    filters: &[FilterCondition],
    initial_capital: f64,
) -> Result<FilterVerification, FilterError> {
    if filters.len() > MAX_FILTERS {
        return Err(FilterError::TooManyFilters(filters.len()));
    }

    let kept: Vec<TradeEvent> = trades
        .iter()
        .filter(|t| filters.iter().all(|f| f.matches(&t.indicator_snapshot)))
        .cloned()
        .collect();

    let before = summarize(trades, initial_capital);
    let after = summarize(&kept, initial_capital);
    let filtered_out_trade_count = trades.len() - kept.len();

    Ok(FilterVerification {
        win_rate_delta: after.win_rate - before.win_rate,
        profit_factor_delta: after.profit_factor.capped(PROFIT_FACTOR_CAP)
            - before.profit_factor.capped(PROFIT_FACTOR_CAP),
        net_profit_delta: after.net_profit - before.net_profit,
        before,
        after,
        filtered_out_trade_count,
    })
}
