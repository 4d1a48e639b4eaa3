//! Serializable backtest request types.
//!
//! A `BacktestRequest` captures everything needed to reproduce a run:
//! strategy identity, entry condition tree, exit rules, date range, stage-1
//! timeframe, and account settings. Requests validate synchronously before
//! any simulation starts, and hash into a content-addressable run ID.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::{ConditionNode, PriceOffset, SimConfig, Timeframe, TradeSide};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Maximum calendar span a single run may cover.
pub const MAX_RANGE_DAYS: i64 = 90;

/// Errors from request validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("start date {start} is not before end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("date range spans {days} days, above the {MAX_RANGE_DAYS}-day cap")]
    RangeTooLong { days: i64 },
    #[error("stage-1 timeframe {0} must be coarser than 1m")]
    Stage1NotCoarse(Timeframe),
    #[error("initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),
    #[error("lot size must be positive, got {0}")]
    NonPositiveLotSize(f64),
    #[error("leverage must be positive, got {0}")]
    NonPositiveLeverage(f64),
    #[error("max holding time must be positive")]
    ZeroHoldingTime,
}

/// Exit rules for every position a run opens.
///
/// The holding cap is expressed in wall-clock minutes so the same request
/// means the same thing on a 15m stage-1 pass and a 1m stage-2 pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSpec {
    pub take_profit: PriceOffset,
    pub stop_loss: PriceOffset,
    pub max_holding_minutes: u32,
}

impl ExitSpec {
    /// Holding cap in bars of the given timeframe (at least one bar).
    pub fn timeout_bars(&self, timeframe: Timeframe) -> usize {
        (self.max_holding_minutes / timeframe.minutes()).max(1) as usize
    }
}

/// Everything needed to reproduce one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub strategy_id: String,
    pub version_number: u32,
    /// Entry rule, evaluated per bar on the signal timeframe.
    pub entry: ConditionNode,
    pub side: TradeSide,
    pub exit: ExitSpec,
    /// Range is inclusive on both ends.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stage1_timeframe: Timeframe,
    /// Re-run on 1m data when stage 1 produces at least one trade.
    pub run_stage2: bool,
    pub initial_capital: f64,
    pub lot_size: f64,
    pub leverage: f64,
}

impl BacktestRequest {
    /// Reject malformed requests before any data is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_date >= self.end_date {
            return Err(ConfigError::InvertedDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        let days = (self.end_date - self.start_date).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(ConfigError::RangeTooLong { days });
        }
        if !self.stage1_timeframe.is_coarse() {
            return Err(ConfigError::Stage1NotCoarse(self.stage1_timeframe));
        }
        if self.initial_capital <= 0.0 {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if self.lot_size <= 0.0 {
            return Err(ConfigError::NonPositiveLotSize(self.lot_size));
        }
        if self.leverage <= 0.0 {
            return Err(ConfigError::NonPositiveLeverage(self.leverage));
        }
        if self.exit.max_holding_minutes == 0 {
            return Err(ConfigError::ZeroHoldingTime);
        }
        Ok(())
    }

    /// Deterministic run ID: BLAKE3 over the serialized request plus the
    /// dataset hash, so identical requests on identical data collide and can
    /// share cached results.
    pub fn run_id(&self, dataset_hash: &str) -> RunId {
        let json = serde_json::to_string(self).expect("request serializes");
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Simulator configuration for a pass on the given timeframe.
    pub fn sim_config(&self, timeframe: Timeframe) -> SimConfig {
        let mut config = SimConfig::new(
            self.side,
            self.exit.take_profit,
            self.exit.stop_loss,
            self.exit.timeout_bars(timeframe),
        );
        config.lot_size = self.lot_size;
        config.leverage = self.leverage;
        config.initial_capital = self.initial_capital;
        config
    }

    /// Copy of the request restricted to a sub-range (walk-forward windows).
    pub fn with_dates(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let mut sub = self.clone();
        sub.start_date = start;
        sub.end_date = end;
        sub
    }
}
