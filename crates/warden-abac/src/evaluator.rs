//! Tri-valued guard evaluation.
//!
//! Evaluates an [`Expression`] against [`LoadedData`] using three-valued
//! logic: a comparison that touches a table the loader did not supply is
//! `Unknown` rather than `False`. Conjunction and disjunction short-circuit
//! on their absorbing value but keep scanning past `Unknown`, so a later
//! `False` (resp. `True`) still decides the whole node.

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::ops::Not;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::LoadedData;
use crate::expression::{Comparison, Expression, Operand, Operator, Operands};
use crate::scalar::{Scalar, ScalarKind};

// ============================================================================
// TriValue
// ============================================================================

/// Result of evaluating a guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriValue {
    True,
    False,
    /// The guard could not be decided because required data was not loaded.
    Unknown,
}

impl TriValue {
    /// Only `True` triggers a policy.
    pub fn is_true(self) -> bool {
        self == TriValue::True
    }

    /// Three-valued conjunction.
    #[must_use]
    pub fn and(self, other: TriValue) -> TriValue {
        match (self, other) {
            (TriValue::False, _) | (_, TriValue::False) => TriValue::False,
            (TriValue::True, TriValue::True) => TriValue::True,
            _ => TriValue::Unknown,
        }
    }

    /// Three-valued disjunction.
    #[must_use]
    pub fn or(self, other: TriValue) -> TriValue {
        match (self, other) {
            (TriValue::True, _) | (_, TriValue::True) => TriValue::True,
            (TriValue::False, TriValue::False) => TriValue::False,
            _ => TriValue::Unknown,
        }
    }
}

impl From<bool> for TriValue {
    fn from(value: bool) -> Self {
        if value { TriValue::True } else { TriValue::False }
    }
}

impl Not for TriValue {
    type Output = TriValue;

    fn not(self) -> TriValue {
        match self {
            TriValue::True => TriValue::False,
            TriValue::False => TriValue::True,
            TriValue::Unknown => TriValue::Unknown,
        }
    }
}

impl Display for TriValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriValue::True => "TRUE",
            TriValue::False => "FALSE",
            TriValue::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Fatal evaluation error: the guard itself is misconfigured.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    /// An ordering operator applied to values with no natural ordering.
    #[error("cannot order-compare {left} with {right} in `{comparison}`")]
    Incomparable {
        comparison: String,
        left: ScalarKind,
        right: ScalarKind,
    },
}

// ============================================================================
// Public API
// ============================================================================

/// Stateless evaluator handle.
///
/// Holds no data; exists so an engine is assembled from a loader and an
/// evaluator value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    /// See [`evaluate`].
    pub fn evaluate(
        &self,
        expr: &Expression,
        data: &LoadedData,
    ) -> Result<TriValue, EvaluationError> {
        evaluate(expr, data)
    }
}

/// Evaluates `expr` against `data`.
///
/// Pure: never mutates `data` and keeps no state between calls.
///
/// # Errors
///
/// Returns [`EvaluationError::Incomparable`] when an ordering operator meets
/// two non-null values of a kind without a natural ordering (booleans, NaN).
/// Operands after a short-circuit point are never evaluated, so they cannot
/// raise this error.
pub fn evaluate(expr: &Expression, data: &LoadedData) -> Result<TriValue, EvaluationError> {
    match expr {
        Expression::Comparison(cmp) => evaluate_comparison(cmp, data),
        Expression::And(operands) => evaluate_and(operands, data),
        Expression::Or(operands) => evaluate_or(operands, data),
        Expression::Not(operand) => Ok(!evaluate(operand, data)?),
    }
}

// ============================================================================
// Logical Nodes
// ============================================================================

fn evaluate_and(operands: &Operands, data: &LoadedData) -> Result<TriValue, EvaluationError> {
    let mut saw_unknown = false;
    for operand in operands {
        match evaluate(operand, data)? {
            TriValue::False => return Ok(TriValue::False),
            TriValue::Unknown => saw_unknown = true,
            TriValue::True => {}
        }
    }
    Ok(if saw_unknown {
        TriValue::Unknown
    } else {
        TriValue::True
    })
}

fn evaluate_or(operands: &Operands, data: &LoadedData) -> Result<TriValue, EvaluationError> {
    let mut saw_unknown = false;
    for operand in operands {
        match evaluate(operand, data)? {
            TriValue::True => return Ok(TriValue::True),
            TriValue::Unknown => saw_unknown = true,
            TriValue::False => {}
        }
    }
    Ok(if saw_unknown {
        TriValue::Unknown
    } else {
        TriValue::False
    })
}

// ============================================================================
// Comparison
// ============================================================================

fn evaluate_comparison(cmp: &Comparison, data: &LoadedData) -> Result<TriValue, EvaluationError> {
    let Some(left) = data.resolve(&cmp.field) else {
        return Ok(TriValue::Unknown);
    };
    let right = match &cmp.rhs {
        Operand::Literal(value) => value.clone(),
        Operand::Reference(path) => match data.resolve(path) {
            Some(value) => value,
            None => return Ok(TriValue::Unknown),
        },
    };

    if left.is_null() || right.is_null() {
        return Ok(match cmp.operator {
            Operator::Equals => TriValue::from(left.is_null() && right.is_null()),
            Operator::NotEquals => TriValue::from(left.is_null() != right.is_null()),
            _ => TriValue::Unknown,
        });
    }

    if left.kind() != right.kind() {
        return Ok(match cmp.operator {
            Operator::Equals => TriValue::False,
            Operator::NotEquals => TriValue::True,
            _ => TriValue::Unknown,
        });
    }

    apply_operator(cmp, &left, &right)
}

/// Applies the operator to two non-null values of the same kind.
fn apply_operator(
    cmp: &Comparison,
    left: &Scalar,
    right: &Scalar,
) -> Result<TriValue, EvaluationError> {
    let holds: fn(Ordering) -> bool = match cmp.operator {
        Operator::Equals => return Ok(TriValue::from(left.value_eq(right))),
        Operator::NotEquals => return Ok(TriValue::from(!left.value_eq(right))),
        Operator::GreaterThan => Ordering::is_gt,
        Operator::LessThan => Ordering::is_lt,
        Operator::GreaterEqual => Ordering::is_ge,
        Operator::LessEqual => Ordering::is_le,
    };
    match left.natural_cmp(right) {
        Some(order) => Ok(TriValue::from(holds(order))),
        None => Err(EvaluationError::Incomparable {
            comparison: cmp.to_string(),
            left: left.kind(),
            right: right.kind(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
