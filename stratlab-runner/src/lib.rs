//! StratLab Runner — orchestration on top of `stratlab-core`.
//!
//! This crate builds on the engine to provide:
//! - Serializable backtest requests with content-addressable run IDs
//! - CSV bar loading and the `SeriesProvider` data seam
//! - Two-stage (coarse then 1m) backtest orchestration
//! - Walk-forward validation with an overfit score
//! - Monte Carlo random-entry baselines and percentile ranking
//! - Post-hoc filter analysis and verification
//! - JSON/CSV result artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod filters;
pub mod monte_carlo;
pub mod runner;
pub mod walk_forward;

pub use config::{BacktestRequest, ConfigError, ExitSpec, RunId, MAX_RANGE_DAYS};
pub use data_loader::{
    load_bars_csv, InMemoryProvider, LoadError, LoadedSeries, SeriesProvider,
};
pub use export::{
    export_record_json, export_trades_csv, import_record_json, load_artifacts, save_artifacts,
};
pub use filters::{
    analyze, verify, FilterCandidate, FilterCondition, FilterError, FilterVerification,
    MAX_FILTERS,
};
pub use monte_carlo::{
    run_monte_carlo, Assessment, DistributionStats, HistogramBin, McComparison, McError,
    MetricDistributions, MonteCarloRequest, MonteCarloResult, ALLOWED_ITERATIONS,
    PROFIT_FACTOR_CAP,
};
pub use runner::{
    run_backtest, try_run_backtest, BacktestRecord, RunError, RunStatus, Stage, SCHEMA_VERSION,
};
pub use walk_forward::{
    create_splits, run_walk_forward, DateRange, SplitSpec, WalkForwardError, WalkForwardRequest,
    WalkForwardResult, WalkForwardSplit,
};
