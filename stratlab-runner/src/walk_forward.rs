//! Walk-forward validation — in-sample/out-of-sample fold evaluation.
//!
//! The overall date range splits into N equal folds; each fold holds a
//! contiguous in-sample (IS) window followed by its out-of-sample (OOS)
//! window, 70/30 by default. Every window runs the full two-stage backtest
//! independently, so folds parallelize across Rayon workers with no shared
//! mutable state. The run-level `overfit_score` is the mean absolute
//! divergence between IS and OOS win rate: low divergence means the strategy
//! behaves the same on data it never saw, high divergence means curve-fit.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::ResultSummary;

use crate::config::BacktestRequest;
use crate::runner::{try_run_backtest, RunError};
use crate::data_loader::SeriesProvider;

/// In-sample share of each fold when explicit day counts are not given.
const DEFAULT_IS_NUMERATOR: i64 = 7;
const DEFAULT_IS_DENOMINATOR: i64 = 10;

/// Walk-forward request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardRequest {
    /// Number of folds, typically 3-5.
    pub split_count: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Explicit in-sample days per fold; defaults to 70% of the fold.
    pub in_sample_days: Option<i64>,
    /// Explicit out-of-sample days per fold; defaults to the fold remainder.
    pub out_of_sample_days: Option<i64>,
}

/// Inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Window layout of one fold, before any simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub split_number: usize,
    pub in_sample: DateRange,
    pub out_of_sample: DateRange,
}

/// One evaluated fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardSplit {
    pub split_number: usize,
    pub in_sample: DateRange,
    pub out_of_sample: DateRange,
    pub in_sample_summary: ResultSummary,
    pub out_of_sample_summary: ResultSummary,
}

impl WalkForwardSplit {
    /// Absolute IS/OOS win-rate divergence for this fold.
    pub fn win_rate_divergence(&self) -> f64 {
        (self.in_sample_summary.win_rate - self.out_of_sample_summary.win_rate).abs()
    }
}

/// Complete walk-forward result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub splits: Vec<WalkForwardSplit>,
    /// Mean absolute IS/OOS win-rate divergence across folds.
    pub overfit_score: f64,
}

/// Errors from walk-forward validation.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("split count must be positive")]
    ZeroSplits,
    #[error("range of {days} days cannot fit {splits} folds of at least {min_fold_days} days")]
    RangeTooShort {
        days: i64,
        splits: usize,
        min_fold_days: i64,
    },
    #[error("split {split} failed: {source}")]
    SplitFailed {
        split: usize,
        #[source]
        source: RunError,
    },
    #[error("walk-forward cancelled")]
    Cancelled,
}

// ─── Fold layout ─────────────────────────────────────────────────────

/// Lay out fold windows over the request's date range.
///
/// Folds are equal-length, contiguous and non-overlapping; within each fold
/// the OOS window starts the day after the IS window ends. Every window needs
/// at least two calendar days so each sub-request has a valid range.
pub fn create_splits(request: &WalkForwardRequest) -> Result<Vec<SplitSpec>, WalkForwardError> {
    if request.split_count == 0 {
        return Err(WalkForwardError::ZeroSplits);
    }
    let n = request.split_count as i64;
    let total_days = (request.end_date - request.start_date).num_days() + 1;

    let (is_days, oos_days) = match (request.in_sample_days, request.out_of_sample_days) {
        (Some(is), Some(oos)) => (is, oos),
        (Some(is), None) => (is, (total_days / n) - is),
        (None, Some(oos)) => ((total_days / n) - oos, oos),
        (None, None) => {
            let fold_len = total_days / n;
            let is = fold_len * DEFAULT_IS_NUMERATOR / DEFAULT_IS_DENOMINATOR;
            (is, fold_len - is)
        }
    };
    let fold_len = is_days + oos_days;

    if is_days < 2 || oos_days < 2 || fold_len * n > total_days {
        return Err(WalkForwardError::RangeTooShort {
            days: total_days,
            splits: request.split_count,
            min_fold_days: 4,
        });
    }

    let mut splits = Vec::with_capacity(request.split_count);
    for i in 0..n {
        let fold_start = request.start_date + chrono::Duration::days(i * fold_len);
        let is_end = fold_start + chrono::Duration::days(is_days - 1);
        let oos_start = is_end + chrono::Duration::days(1);
        let oos_end = oos_start + chrono::Duration::days(oos_days - 1);
        splits.push(SplitSpec {
            split_number: i as usize + 1,
            in_sample: DateRange {
                start: fold_start,
                end: is_end,
            },
            out_of_sample: DateRange {
                start: oos_start,
                end: oos_end,
            },
        });
    }
    Ok(splits)
}

// ─── Orchestration ───────────────────────────────────────────────────

/// Run walk-forward validation.
///
/// Folds execute in parallel and fail fast: one failed window poisons the
/// whole batch, since a partial divergence score is statistically
/// misleading. `cancel` is polled between windows, never mid-simulation.
pub fn run_walk_forward(
    request: &BacktestRequest,
    wf_request: &WalkForwardRequest,
    provider: &dyn SeriesProvider,
    thread_cap: Option<usize>,
    cancel: Option<&AtomicBool>,
) -> Result<WalkForwardResult, WalkForwardError> {
    let specs = create_splits(wf_request)?;

    let evaluate = || -> Result<Vec<WalkForwardSplit>, WalkForwardError> {
        specs
            .par_iter()
            .map(|spec| run_split(request, spec, provider, cancel))
            .collect()
    };

    let splits = match thread_cap {
        Some(cap) if cap > 0 => rayon::ThreadPoolBuilder::new()
            .num_threads(cap)
            .build()
            .expect("failed to build Rayon thread pool")
            .install(evaluate),
        _ => evaluate(),
    }?;

    let overfit_score = splits
        .iter()
        .map(WalkForwardSplit::win_rate_divergence)
        .sum::<f64>()
        / splits.len() as f64;

    Ok(WalkForwardResult {
        splits,
        overfit_score,
    })
}

fn run_split(
    request: &BacktestRequest,
    spec: &SplitSpec,
    provider: &dyn SeriesProvider,
    cancel: Option<&AtomicBool>,
) -> Result<WalkForwardSplit, WalkForwardError> {
    if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
        return Err(WalkForwardError::Cancelled);
    }

    let run_window = |range: &DateRange| {
        try_run_backtest(&request.with_dates(range.start, range.end), provider).map_err(|e| {
            WalkForwardError::SplitFailed {
                split: spec.split_number,
                source: e,
            }
        })
    };

    let is_record = run_window(&spec.in_sample)?;
    let oos_record = run_window(&spec.out_of_sample)?;

    Ok(WalkForwardSplit {
        split_number: spec.split_number,
        in_sample: spec.in_sample,
        out_of_sample: spec.out_of_sample,
        in_sample_summary: is_record.summary,
        out_of_sample_summary: oos_record.summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wf(total_days: i64, splits: usize) -> WalkForwardRequest {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        WalkForwardRequest {
            split_count: splits,
            start_date: start,
            end_date: start + chrono::Duration::days(total_days - 1),
            in_sample_days: None,
            out_of_sample_days: None,
        }
    }

    #[test]
    fn hundred_days_five_folds() {
        let splits = create_splits(&wf(100, 5)).unwrap();
        assert_eq!(splits.len(), 5);
        for spec in &splits {
            // 20-day folds, 70/30: 14 IS days, 6 OOS days
            assert_eq!(spec.in_sample.days(), 14);
            assert_eq!(spec.out_of_sample.days(), 6);
        }
    }

    #[test]
    fn windows_contiguous_within_fold() {
        let splits = create_splits(&wf(100, 5)).unwrap();
        for spec in &splits {
            assert_eq!(
                spec.out_of_sample.start,
                spec.in_sample.end + chrono::Duration::days(1)
            );
        }
    }

    #[test]
    fn folds_do_not_overlap() {
        let splits = create_splits(&wf(100, 4)).unwrap();
        for pair in splits.windows(2) {
            assert!(pair[1].in_sample.start > pair[0].out_of_sample.end);
        }
    }

    #[test]
    fn explicit_day_counts_respected() {
        let mut request = wf(90, 3);
        request.in_sample_days = Some(20);
        request.out_of_sample_days = Some(10);
        let splits = create_splits(&request).unwrap();
        assert_eq!(splits.len(), 3);
        for spec in &splits {
            assert_eq!(spec.in_sample.days(), 20);
            assert_eq!(spec.out_of_sample.days(), 10);
        }
    }

    #[test]
    fn range_too_short_rejected() {
        assert!(matches!(
            create_splits(&wf(10, 5)),
            Err(WalkForwardError::RangeTooShort { .. })
        ));
    }

    #[test]
    fn zero_splits_rejected() {
        assert!(matches!(
            create_splits(&wf(100, 0)),
            Err(WalkForwardError::ZeroSplits)
        ));
    }

    #[test]
    fn explicit_days_exceeding_range_rejected() {
        let mut request = wf(30, 3);
        request.in_sample_days = Some(20);
        request.out_of_sample_days = Some(10);
        // 3 folds of 30 days each need 90 days, only 30 available
        assert!(create_splits(&request).is_err());
    }

    #[test]
    fn divergence_is_absolute() {
        let mut is_summary = ResultSummary::empty();
        is_summary.win_rate = 0.3;
        let mut oos_summary = ResultSummary::empty();
        oos_summary.win_rate = 0.7;
        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        };
        let split = WalkForwardSplit {
            split_number: 1,
            in_sample: range,
            out_of_sample: range,
            in_sample_summary: is_summary,
            out_of_sample_summary: oos_summary,
        };
        assert!((split.win_rate_divergence() - 0.4).abs() < 1e-12);
    }
}
