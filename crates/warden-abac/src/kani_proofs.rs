//! Kani proofs for tri-valued evaluation and decision resolution
//!
//! These proofs check the logic laws the engine relies on using bounded
//! model checking over every `TriValue` combination.
//!
//! **Proof Count**: 5 proofs
//!
//! Run with: `cargo kani --tests --harness verify_*`

use crate::data::{LoadedData, Row};
use crate::evaluator::{TriValue, evaluate};
use crate::expression::{Expression, FieldPath};

#[cfg(kani)]
fn any_trivalue() -> TriValue {
    match kani::any::<u8>() % 3 {
        0 => TriValue::True,
        1 => TriValue::False,
        _ => TriValue::Unknown,
    }
}

/// Proof #1: FALSE absorbs conjunction
///
/// **Property**: `FALSE AND x = FALSE` and `x AND FALSE = FALSE` for all x
#[cfg(kani)]
#[kani::proof]
fn verify_false_absorbs_and() {
    let x = any_trivalue();
    assert_eq!(TriValue::False.and(x), TriValue::False);
    assert_eq!(x.and(TriValue::False), TriValue::False);
}

/// Proof #2: TRUE absorbs disjunction
///
/// **Property**: `TRUE OR x = TRUE` and `x OR TRUE = TRUE` for all x
#[cfg(kani)]
#[kani::proof]
fn verify_true_absorbs_or() {
    let x = any_trivalue();
    assert_eq!(TriValue::True.or(x), TriValue::True);
    assert_eq!(x.or(TriValue::True), TriValue::True);
}

/// Proof #3: De Morgan holds under three-valued logic
///
/// **Property**: `NOT (a AND b) = (NOT a) OR (NOT b)`
#[cfg(kani)]
#[kani::proof]
fn verify_de_morgan() {
    let a = any_trivalue();
    let b = any_trivalue();
    assert_eq!(!(a.and(b)), (!a).or(!b));
    assert_eq!(!(a.or(b)), (!a).and(!b));
}

/// Proof #4: Only TRUE triggers a policy
///
/// **Property**: `is_true` holds exactly for `TRUE`, so UNKNOWN behaves like
/// FALSE when deciding whether a guard fires
#[cfg(kani)]
#[kani::proof]
fn verify_only_true_triggers() {
    let x = any_trivalue();
    assert_eq!(x.is_true(), x == TriValue::True);
    if x == TriValue::Unknown {
        assert!(!x.is_true());
        assert_eq!(!x, TriValue::Unknown);
    }
}

/// One-row data set against which [`leaf`] comparisons are evaluated.
fn leaf_data() -> LoadedData {
    LoadedData::new().with_row("user", Row::new().with("id", "u1"))
}

/// A comparison that evaluates to `value` against [`leaf_data`].
fn leaf(value: TriValue) -> Expression {
    let (table, id) = match value {
        TriValue::True => ("user", "u1"),
        TriValue::False => ("user", "u2"),
        TriValue::Unknown => ("teamMembership", "u1"),
    };
    Expression::eq(FieldPath::new(table, "id"), id)
}

/// Proof #5: Scanning evaluation agrees with the TriValue operators
///
/// **Property**: for two operands, `evaluate(a AND b) = a.and(b)` and
/// `evaluate(a OR b) = a.or(b)`
#[cfg(kani)]
#[kani::proof]
#[kani::unwind(4)]
fn verify_two_operand_evaluation_matches_operators() {
    let a = any_trivalue();
    let b = any_trivalue();
    let data = leaf_data();

    let and = evaluate(&Expression::and([leaf(a), leaf(b)]), &data);
    let or = evaluate(&Expression::or([leaf(a), leaf(b)]), &data);
    assert!(and == Ok(a.and(b)));
    assert!(or == Ok(a.or(b)));
}
