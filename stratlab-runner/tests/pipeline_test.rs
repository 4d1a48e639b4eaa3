//! End-to-end pipeline tests over synthetic 1-minute data.
//!
//! Exercises the full chain: provider → two-stage orchestrator →
//! walk-forward → Monte Carlo → filter analysis, with no file I/O beyond
//! the artifact round-trip.

use chrono::NaiveDate;
use std::sync::atomic::AtomicBool;

use stratlab_core::{
    Bar, BarSeries, CompareOp, ConditionNode, IndicatorSpec, PriceOffset, ResultSummary,
    Timeframe, TradeSide,
};
use stratlab_runner::{
    run_backtest, run_monte_carlo, run_walk_forward, save_artifacts, try_run_backtest,
    verify, BacktestRequest, ExitSpec, InMemoryProvider, MonteCarloRequest, RunStatus, Stage,
    WalkForwardError, WalkForwardRequest,
};

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Synthetic 1m series: a slow sine wave so both sides trade.
fn synthetic_provider(days: u32) -> InMemoryProvider {
    let mut bars = Vec::with_capacity(days as usize * 1440);
    for day in 0..days {
        for minute in 0..1440u32 {
            let i = f64::from(day * 1440 + minute);
            let price = 100.0 + (i * 0.002).sin() * 4.0 + (i * 0.031).sin() * 0.5;
            bars.push(Bar {
                timestamp: start_date()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    + chrono::Duration::days(i64::from(day))
                    + chrono::Duration::minutes(i64::from(minute)),
                open: price,
                high: price + 0.25,
                low: price - 0.25,
                close: price,
                volume: 40.0,
            });
        }
    }
    InMemoryProvider::new(BarSeries::new(bars).unwrap())
}

fn request(days: i64) -> BacktestRequest {
    BacktestRequest {
        strategy_id: "rsi-meanrev".into(),
        version_number: 1,
        entry: ConditionNode::all(vec![ConditionNode::compare(
            IndicatorSpec::new("rsi", 14),
            CompareOp::Lt,
            45.0,
        )]),
        side: TradeSide::Long,
        exit: ExitSpec {
            take_profit: PriceOffset::Percent(0.4),
            stop_loss: PriceOffset::Percent(0.4),
            max_holding_minutes: 120,
        },
        start_date: start_date(),
        end_date: start_date() + chrono::Duration::days(days - 1),
        stage1_timeframe: Timeframe::M15,
        run_stage2: true,
        initial_capital: 1_000_000.0,
        lot_size: 1_000.0,
        leverage: 100.0,
    }
}

#[test]
fn two_stage_run_produces_fine_record() {
    let provider = synthetic_provider(10);
    let record = try_run_backtest(&request(10), &provider).unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert_eq!(record.stage, Stage::Fine);
    assert_eq!(record.timeframe, Timeframe::M1);
    assert!(!record.trades.is_empty());
    assert_eq!(record.summary.total_trades, record.trades.len());
    // Every entry snapshot carries the tree's indicator
    assert!(record
        .trades
        .iter()
        .all(|t| t.indicator_snapshot.contains_key("rsi_14")));
}

#[test]
fn failed_run_is_atomic() {
    let provider = synthetic_provider(2);
    let mut req = request(10); // asks past the loaded data
    req.start_date = start_date() + chrono::Duration::days(30);
    req.end_date = start_date() + chrono::Duration::days(40);
    let record = run_backtest(&req, &provider);

    assert_eq!(record.status, RunStatus::Failed);
    assert!(record.trades.is_empty());
    assert_eq!(record.summary.total_trades, 0);
}

#[test]
fn walk_forward_end_to_end() {
    let provider = synthetic_provider(30);
    let req = request(30);
    let wf = WalkForwardRequest {
        split_count: 3,
        start_date: req.start_date,
        end_date: req.end_date,
        in_sample_days: None,
        out_of_sample_days: None,
    };
    let result = run_walk_forward(&req, &wf, &provider, Some(2), None).unwrap();

    assert_eq!(result.splits.len(), 3);
    assert!(result.overfit_score >= 0.0 && result.overfit_score <= 1.0);
    for split in &result.splits {
        assert!(split.out_of_sample.start > split.in_sample.end);
    }
}

#[test]
fn walk_forward_cancellation() {
    let provider = synthetic_provider(30);
    let req = request(30);
    let wf = WalkForwardRequest {
        split_count: 3,
        start_date: req.start_date,
        end_date: req.end_date,
        in_sample_days: None,
        out_of_sample_days: None,
    };
    let cancel = AtomicBool::new(true);
    let result = run_walk_forward(&req, &wf, &provider, None, Some(&cancel));
    assert!(matches!(result, Err(WalkForwardError::Cancelled)));
}

#[test]
fn monte_carlo_ranks_the_real_run() {
    let provider = synthetic_provider(5);
    let req = request(5);
    let record = try_run_backtest(&req, &provider).unwrap();

    let mc = MonteCarloRequest {
        iterations: 100,
        start_date: req.start_date,
        end_date: req.end_date,
        timeframe: Timeframe::M1,
        side: req.side,
        exit: req.exit.clone(),
        initial_capital: req.initial_capital,
        lot_size: req.lot_size,
        leverage: req.leverage,
        entry_probability: 0.05,
        seed: 7,
    };
    let result = run_monte_carlo(&mc, &record.summary, &provider, None, None).unwrap();

    assert_eq!(result.simulations.len(), 100);
    for stats in [
        &result.statistics.win_rate,
        &result.statistics.net_profit_rate,
    ] {
        assert!(stats.std_dev >= 0.0);
        assert!(stats.p5 <= stats.p95);
        let mass: f64 = stats.histogram.iter().map(|b| b.pct).sum();
        assert!((mass - 100.0).abs() < 1e-6);
    }
    assert!((0.0..=100.0).contains(&result.comparison.overall_score));

    // Determinism across the whole pipeline
    let again = run_monte_carlo(&mc, &record.summary, &provider, Some(4), None).unwrap();
    assert_eq!(result.statistics, again.statistics);
}

#[test]
fn filter_verification_on_real_trades() {
    let provider = synthetic_provider(10);
    let record = try_run_backtest(&request(10), &provider).unwrap();
    assert!(record.trades.len() >= 4);

    // Zero filters: identity
    let identity = verify(&record.trades, &[], record.summary.initial_capital).unwrap();
    assert_eq!(identity.before, identity.after);
    assert_eq!(identity.filtered_out_trade_count, 0);

    // Candidates come straight from the recorded snapshots
    let candidates = stratlab_runner::analyze(&record.trades);
    if let Some(best) = candidates.first() {
        let v = verify(
            &record.trades,
            std::slice::from_ref(&best.suggested),
            record.summary.initial_capital,
        )
        .unwrap();
        assert!(v.after.total_trades <= v.before.total_trades);
        assert_eq!(
            v.filtered_out_trade_count,
            v.before.total_trades - v.after.total_trades
        );
    }
}

#[test]
fn artifacts_roundtrip_through_disk() {
    let provider = synthetic_provider(5);
    let record = try_run_backtest(&request(5), &provider).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let run_dir = save_artifacts(&record, dir.path()).unwrap();
    let loaded = stratlab_runner::load_artifacts(&run_dir).unwrap();

    assert_eq!(loaded.id, record.id);
    assert_eq!(loaded.trades.len(), record.trades.len());
    assert_eq!(loaded.summary, record.summary);
}

#[test]
fn bankrupt_run_reports_terminal_state_not_error() {
    let provider = synthetic_provider(10);
    let mut req = request(10);
    // Tiny account, oversized lot: losses cross the floor fast
    req.initial_capital = 2_000.0;
    req.lot_size = 50_000.0;
    req.run_stage2 = false;
    let record = try_run_backtest(&req, &provider).unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    if record.stopped_reason == Some(stratlab_core::StoppedReason::Bankruptcy) {
        assert!(record.summary.net_profit < 0.0);
    }
}

#[test]
fn zero_trade_run_summarizes_cleanly() {
    let provider = synthetic_provider(5);
    let mut req = request(5);
    req.entry = ConditionNode::compare(IndicatorSpec::new("rsi", 14), CompareOp::Gt, 1e9);
    let record = try_run_backtest(&req, &provider).unwrap();

    assert!(record.trades.is_empty());
    assert_eq!(record.summary, {
        let mut s = ResultSummary::empty();
        s.initial_capital = req.initial_capital;
        s
    });
}
