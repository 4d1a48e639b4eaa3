//! Two-stage backtest orchestrator.
//!
//! Stage 1 runs the simulator on the request's coarse timeframe for speed.
//! When stage 2 is requested and stage 1 produced at least one trade, the
//! identical strategy and range re-run on 1-minute data and only the fine
//! record survives: coarse bars can mis-order intrabar TP/SL hits, so the
//! fine pass is authoritative whenever it exists.
//!
//! A run is atomic. Infrastructure failures surface as a `Failed` record
//! carrying the message and no trades; partial trade lists are never kept.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::{
    simulate, summarize, BuiltinIndicators, ConditionTrigger, ResultSummary, StoppedReason,
    Timeframe, TradeEvent,
};

use crate::config::{BacktestRequest, ConfigError, RunId};
use crate::data_loader::{LoadError, SeriesProvider};

/// Current schema version for persisted records.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
}

/// Which pass produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Coarse,
    Fine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Complete, persistable result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRecord {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: RunId,
    pub strategy_id: String,
    pub version_number: u32,
    pub timeframe: Timeframe,
    pub stage: Stage,
    pub status: RunStatus,
    pub summary: ResultSummary,
    pub trades: Vec<TradeEvent>,
    /// None for failed runs that never reached the simulator.
    pub stopped_reason: Option<StoppedReason>,
    pub coverage_ratio: f64,
    pub dataset_hash: String,
    pub error_message: Option<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run a backtest, folding any failure into a `Failed` record.
///
/// This is the persistence-facing entry point: callers always get a record
/// they can store, never a half-finished run.
pub fn run_backtest(request: &BacktestRequest, provider: &dyn SeriesProvider) -> BacktestRecord {
    match try_run_backtest(request, provider) {
        Ok(record) => record,
        Err(e) => failed_record(request, &e),
    }
}

/// Run a backtest, propagating errors for callers that compose runs
/// (walk-forward folds, Monte Carlo batches) and need fail-fast semantics.
pub fn try_run_backtest(
    request: &BacktestRequest,
    provider: &dyn SeriesProvider,
) -> Result<BacktestRecord, RunError> {
    request.validate()?;

    let coarse = run_stage(request, provider, request.stage1_timeframe, Stage::Coarse)?;
    if request.run_stage2 && !coarse.trades.is_empty() {
        // Stage 1 is discarded once the fine pass succeeds.
        return run_stage(request, provider, Timeframe::M1, Stage::Fine);
    }
    Ok(coarse)
}

fn run_stage(
    request: &BacktestRequest,
    provider: &dyn SeriesProvider,
    timeframe: Timeframe,
    stage: Stage,
) -> Result<BacktestRecord, RunError> {
    let loaded = provider.series(timeframe, request.start_date, request.end_date)?;
    let config = request.sim_config(timeframe);
    let mut trigger = ConditionTrigger::new(&request.entry, loaded.series.bars(), &BuiltinIndicators);
    let outcome = simulate(loaded.series.bars(), &config, &mut trigger);
    let summary = summarize(&outcome.trades, config.initial_capital);

    Ok(BacktestRecord {
        schema_version: SCHEMA_VERSION,
        id: request.run_id(&loaded.dataset_hash),
        strategy_id: request.strategy_id.clone(),
        version_number: request.version_number,
        timeframe,
        stage,
        status: RunStatus::Completed,
        summary,
        trades: outcome.trades,
        stopped_reason: Some(outcome.stopped_reason),
        coverage_ratio: loaded.coverage_ratio,
        dataset_hash: loaded.dataset_hash,
        error_message: None,
    })
}

fn failed_record(request: &BacktestRequest, error: &RunError) -> BacktestRecord {
    BacktestRecord {
        schema_version: SCHEMA_VERSION,
        id: request.run_id(""),
        strategy_id: request.strategy_id.clone(),
        version_number: request.version_number,
        timeframe: request.stage1_timeframe,
        stage: Stage::Coarse,
        status: RunStatus::Failed,
        summary: ResultSummary::empty(),
        trades: Vec::new(),
        stopped_reason: None,
        coverage_ratio: 0.0,
        dataset_hash: String::new(),
        error_message: Some(error.to_string()),
    }
}
