//! Indicator seam — the engine's view of the indicator library.
//!
//! The evaluator asks a provider for "indicator X with period P over the
//! trailing window ending at bar i". `None` means insufficient warm-up; the
//! evaluator treats that as a false comparison, never an error.

mod builtin;

pub use builtin::BuiltinIndicators;

use crate::domain::{Bar, IndicatorSpec};

/// Computes one indicator value at one bar index.
///
/// Implementations must be pure with respect to `(spec, bars, index)`:
/// memoization in [`EvalContext`](crate::eval::EvalContext) relies on it.
pub trait IndicatorProvider: Send + Sync {
    /// Value of `spec` over the trailing window ending at `index` (inclusive).
    ///
    /// Returns `None` when the window has too few bars, the key is unknown,
    /// or the computation yields a non-finite number.
    fn value(&self, spec: &IndicatorSpec, bars: &[Bar], index: usize) -> Option<f64>;
}
