//! Entry triggers — the seam between the simulator and "why we entered".
//!
//! Real strategies enter on a condition tree; the Monte Carlo baseline enters
//! on a seeded random process. Both feed the identical simulation loop, so
//! TP/SL/timeout semantics are shared code, never reimplemented.

use crate::domain::{Bar, ConditionNode, IndicatorSnapshot, IndicatorSpec};
use crate::eval::{evaluate, EvalContext};
use crate::indicators::IndicatorProvider;
use rand::rngs::StdRng;
use rand::Rng;

/// Decides whether to enter at a bar index.
///
/// `should_enter` is called exactly once per flat, post-warm-up bar, in
/// ascending index order — random implementations rely on this for
/// reproducibility.
pub trait EntryTrigger {
    fn should_enter(&mut self, index: usize) -> bool;

    /// Indicator values to stamp onto the resulting trade. Defaults to empty
    /// for triggers with no indicator context.
    fn snapshot(&mut self, index: usize) -> IndicatorSnapshot {
        let _ = index;
        IndicatorSnapshot::new()
    }
}

/// Condition-tree trigger: evaluates the strategy's entry rule through a
/// memoizing [`EvalContext`].
pub struct ConditionTrigger<'a> {
    tree: &'a ConditionNode,
    specs: Vec<IndicatorSpec>,
    ctx: EvalContext<'a>,
}

impl<'a> ConditionTrigger<'a> {
    pub fn new(tree: &'a ConditionNode, bars: &'a [Bar], provider: &'a dyn IndicatorProvider) -> Self {
        Self {
            tree,
            specs: tree.referenced_indicators(),
            ctx: EvalContext::new(bars, provider),
        }
    }
}

impl EntryTrigger for ConditionTrigger<'_> {
    fn should_enter(&mut self, index: usize) -> bool {
        evaluate(self.tree, &mut self.ctx, index)
    }

    fn snapshot(&mut self, index: usize) -> IndicatorSnapshot {
        self.ctx.snapshot(&self.specs, index)
    }
}

/// Random-entry trigger for Monte Carlo baselines: enters at each eligible
/// bar with fixed probability, using a caller-seeded RNG.
pub struct RandomTrigger {
    rng: StdRng,
    entry_probability: f64,
}

impl RandomTrigger {
    pub fn new(rng: StdRng, entry_probability: f64) -> Self {
        Self {
            rng,
            entry_probability: entry_probability.clamp(0.0, 1.0),
        }
    }
}

impl EntryTrigger for RandomTrigger {
    fn should_enter(&mut self, _index: usize) -> bool {
        self.rng.gen_bool(self.entry_probability)
    }
}
