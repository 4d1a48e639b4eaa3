//! Condition evaluator — boolean evaluation of an entry rule tree at one bar.
//!
//! Evaluation is pure apart from a per-run memoization cache: repeated
//! references to the same `(indicator, period, bar)` triple — within one tree
//! or across repeated evaluations at the same bar — cost one computation.
//! The context is owned per run and never shared, so concurrent runs cannot
//! leak cached values into each other.
//!
//! Vacuous-truth convention: an empty AND group evaluates to `true`, an empty
//! OR group to `false`.

use crate::domain::{Bar, ConditionNode, IndicatorSnapshot, IndicatorSpec, LogicOp, Operand};
use crate::indicators::IndicatorProvider;
use std::collections::HashMap;

/// Per-run evaluation context: bar data, indicator provider, and memo cache.
pub struct EvalContext<'a> {
    bars: &'a [Bar],
    provider: &'a dyn IndicatorProvider,
    cache: HashMap<(String, usize, usize), Option<f64>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(bars: &'a [Bar], provider: &'a dyn IndicatorProvider) -> Self {
        Self {
            bars,
            provider,
            cache: HashMap::new(),
        }
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    /// Memoized indicator lookup at a bar index.
    ///
    /// `None` (insufficient warm-up or unknown key) is cached too, so early
    /// bars do not re-trigger the provider on every evaluation.
    pub fn indicator(&mut self, spec: &IndicatorSpec, index: usize) -> Option<f64> {
        let key = (spec.key.clone(), spec.period, index);
        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }
        let value = self.provider.value(spec, self.bars, index);
        self.cache.insert(key, value);
        value
    }

    /// Values of every indicator in `specs` at `index`, skipping those still
    /// in warm-up. Used to snapshot entry conditions onto trade events.
    pub fn snapshot(&mut self, specs: &[IndicatorSpec], index: usize) -> IndicatorSnapshot {
        let mut snapshot = IndicatorSnapshot::new();
        for spec in specs {
            if let Some(value) = self.indicator(spec, index) {
                snapshot.insert(spec.label(), value);
            }
        }
        snapshot
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

/// Evaluate a condition tree at one bar index.
///
/// A comparison whose left or right indicator is unavailable (NaN output or
/// insufficient warm-up bars) evaluates to `false` rather than erroring, so
/// early bars never spuriously trigger entries. Groups short-circuit: AND
/// stops at the first false child, OR at the first true child.
pub fn evaluate(node: &ConditionNode, ctx: &mut EvalContext<'_>, index: usize) -> bool {
    match node {
        ConditionNode::Comparison { indicator, op, rhs } => {
            let Some(lhs) = ctx.indicator(indicator, index) else {
                return false;
            };
            let rhs = match rhs {
                Operand::Literal(v) => *v,
                Operand::Indicator(spec) => match ctx.indicator(spec, index) {
                    Some(v) => v,
                    None => return false,
                },
            };
            op.apply(lhs, rhs)
        }
        ConditionNode::Group { logic, children } => match logic {
            LogicOp::And => children.iter().all(|c| evaluate(c, ctx, index)),
            LogicOp::Or => children.iter().any(|c| evaluate(c, ctx, index)),
        },
    }
}
