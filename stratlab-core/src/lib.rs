//! StratLab Core — engine for strategy backtesting and validation.
//!
//! This crate contains the non-trivial heart of the system:
//! - Domain types (bars, condition trees, trade events, timeframes)
//! - Condition evaluator with per-run indicator memoization
//! - Single-position simulator with next-bar-open fills and a capital floor
//! - Performance aggregation with explicit unbounded-profit-factor handling
//! - Deterministic RNG hierarchy for reproducible random baselines
//!
//! Orchestration (two-stage runs, walk-forward, Monte Carlo, filter
//! analysis) lives in `stratlab-runner`.

pub mod domain;
pub mod eval;
pub mod indicators;
pub mod rng;
pub mod series;
pub mod sim;
pub mod summary;

pub use domain::{
    Bar, CompareOp, ConditionNode, ExitReason, IndicatorSnapshot, IndicatorSpec, LogicOp, Operand,
    Timeframe, TradeEvent, TradeSide,
};
pub use eval::{evaluate, EvalContext};
pub use indicators::{BuiltinIndicators, IndicatorProvider};
pub use rng::RngHierarchy;
pub use series::{BarSeries, SeriesError};
pub use sim::{
    pip_size, simulate, ConditionTrigger, EntryTrigger, PriceOffset, RandomTrigger, SimConfig,
    SimOutcome, StoppedReason,
};
pub use summary::{summarize, ProfitFactor, ResultSummary};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types cross thread boundaries.
    ///
    /// Walk-forward folds and Monte Carlo iterations run on Rayon workers; if
    /// any of these types loses Send + Sync the build breaks here first.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Bar>();
        require_sync::<Bar>();
        require_send::<BarSeries>();
        require_sync::<BarSeries>();
        require_send::<ConditionNode>();
        require_sync::<ConditionNode>();
        require_send::<TradeEvent>();
        require_sync::<TradeEvent>();
        require_send::<SimConfig>();
        require_sync::<SimConfig>();
        require_send::<SimOutcome>();
        require_sync::<SimOutcome>();
        require_send::<ResultSummary>();
        require_sync::<ResultSummary>();
        require_send::<RngHierarchy>();
        require_sync::<RngHierarchy>();
    }
}
