//! Domain types: bars, condition trees, trades, timeframes.

pub mod bar;
pub mod condition;
pub mod timeframe;
pub mod trade;

pub use bar::Bar;
pub use condition::{CompareOp, ConditionNode, IndicatorSpec, LogicOp, Operand};
pub use timeframe::Timeframe;
pub use trade::{pnl_percent, trade_pnl, ExitReason, IndicatorSnapshot, TradeEvent, TradeSide};
