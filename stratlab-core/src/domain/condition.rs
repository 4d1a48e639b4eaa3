//! Condition tree — the entry rule of a strategy.
//!
//! A strategy entry rule is a boolean expression tree over indicator
//! comparisons. The tree is a tagged union (`Comparison | Group`) with
//! exhaustive matching, so malformed shapes are unrepresentable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to one indicator computation: key plus period parameter.
///
/// The key is resolved by an [`IndicatorProvider`](crate::indicators::IndicatorProvider)
/// at evaluation time; the core never hardcodes the indicator set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub key: String,
    pub period: usize,
}

impl IndicatorSpec {
    pub fn new(key: impl Into<String>, period: usize) -> Self {
        Self {
            key: key.into(),
            period,
        }
    }

    /// Stable label used for cache keys and entry snapshots, e.g. `rsi_14`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.key, self.period)
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.key, self.period)
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl CompareOp {
    /// Apply the operator to two operands.
    ///
    /// `Eq` is exact floating-point equality; callers comparing computed
    /// indicator values against literals should prefer threshold operators.
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
        }
    }
}

/// Right-hand side of a comparison: a constant or another indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Operand {
    Literal(f64),
    Indicator(IndicatorSpec),
}

/// Logical connective for a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOp {
    And,
    Or,
}

/// One node of an entry condition tree.
///
/// Evaluated bottom-up at a fixed bar index. Immutable once built; owned by a
/// strategy version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum ConditionNode {
    Comparison {
        indicator: IndicatorSpec,
        op: CompareOp,
        rhs: Operand,
    },
    Group {
        logic: LogicOp,
        children: Vec<ConditionNode>,
    },
}

impl ConditionNode {
    /// Convenience constructor for a comparison against a literal.
    pub fn compare(indicator: IndicatorSpec, op: CompareOp, rhs: f64) -> Self {
        ConditionNode::Comparison {
            indicator,
            op,
            rhs: Operand::Literal(rhs),
        }
    }

    /// Convenience constructor for an AND group.
    pub fn all(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Group {
            logic: LogicOp::And,
            children,
        }
    }

    /// Convenience constructor for an OR group.
    pub fn any(children: Vec<ConditionNode>) -> Self {
        ConditionNode::Group {
            logic: LogicOp::Or,
            children,
        }
    }

    /// Collect every distinct indicator referenced anywhere in the tree,
    /// including right-hand-side indicator operands.
    pub fn referenced_indicators(&self) -> Vec<IndicatorSpec> {
        let mut specs = Vec::new();
        self.collect_indicators(&mut specs);
        specs.dedup();
        specs
    }

    fn collect_indicators(&self, out: &mut Vec<IndicatorSpec>) {
        match self {
            ConditionNode::Comparison { indicator, rhs, .. } => {
                if !out.contains(indicator) {
                    out.push(indicator.clone());
                }
                if let Operand::Indicator(spec) = rhs {
                    if !out.contains(spec) {
                        out.push(spec.clone());
                    }
                }
            }
            ConditionNode::Group { children, .. } => {
                for child in children {
                    child.collect_indicators(out);
                }
            }
        }
    }
}
