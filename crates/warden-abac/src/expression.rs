//! Guard expression AST.
//!
//! An [`Expression`] is an immutable tree built once (usually from policy
//! configuration) and evaluated many times. The variant set is closed: the
//! evaluator matches it exhaustively, so a new node kind is a compile-time
//! change for every consumer.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scalar::Scalar;

/// Error building an expression.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// A field path that is not of the form `table.column`.
    #[error("invalid field path '{0}': expected 'table.column'")]
    InvalidFieldPath(String),

    /// `And`/`Or` with no operands.
    #[error("conjunction and disjunction require at least one operand")]
    EmptyOperands,
}

// ============================================================================
// FieldPath
// ============================================================================

/// Reference to a column of a loaded table, written `table.column`.
///
/// The table is everything before the first `.`; the column is the rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    table: String,
    column: String,
}

impl FieldPath {
    /// Creates a field path from its parts.
    ///
    /// # Panics
    ///
    /// Panics if either part is empty or the table contains a `.`.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        let table = table.into();
        let column = column.into();
        assert!(
            !table.is_empty() && !column.is_empty() && !table.contains('.'),
            "invalid field path parts: table={table:?} column={column:?}"
        );
        Self { table, column }
    }

    /// Parses `table.column`, splitting on the first `.`.
    pub fn parse(path: &str) -> Result<Self, ExpressionError> {
        match path.split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => Ok(Self {
                table: table.to_string(),
                column: column.to_string(),
            }),
            _ => Err(ExpressionError::InvalidFieldPath(path.to_string())),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

impl FromStr for FieldPath {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ExpressionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

// ============================================================================
// Operator
// ============================================================================

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "eq")]
    Equals,
    #[serde(rename = "ne")]
    NotEquals,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "ge")]
    GreaterEqual,
    #[serde(rename = "le")]
    LessEqual,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterEqual => ">=",
            Operator::LessEqual => "<=",
        }
    }

    /// True for the four ordering operators.
    pub fn is_ordering(self) -> bool {
        !matches!(self, Operator::Equals | Operator::NotEquals)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// Operand / Comparison
// ============================================================================

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// A value embedded in the expression.
    Literal(Scalar),
    /// Another field, resolved against the same loaded data.
    Reference(FieldPath),
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{value}"),
            Operand::Reference(path) => write!(f, "{path}"),
        }
    }
}

impl From<FieldPath> for Operand {
    fn from(path: FieldPath) -> Self {
        Operand::Reference(path)
    }
}

impl From<Scalar> for Operand {
    fn from(value: Scalar) -> Self {
        Operand::Literal(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Literal(Scalar::from(value))
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Literal(Scalar::Bool(value))
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Literal(Scalar::from(value))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Literal(Scalar::Int(value))
    }
}

impl Operand {
    pub fn is_null_literal(&self) -> bool {
        matches!(self, Operand::Literal(Scalar::Null))
    }
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Literal(Scalar::Null)
    }
}

/// Leaf predicate: `field <operator> rhs`.
///
/// A serialized comparison without `rhs` compares against null, since TOML
/// has no null literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: FieldPath,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Operand::is_null_literal")]
    pub rhs: Operand,
}

impl Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.rhs)
    }
}

// ============================================================================
// Operands
// ============================================================================

/// Non-empty, ordered operand list of a conjunction or disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Expression>", into = "Vec<Expression>")]
pub struct Operands(Vec<Expression>);

impl Operands {
    pub fn iter(&self) -> std::slice::Iter<'_, Expression> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<Expression>> for Operands {
    type Error = ExpressionError;

    fn try_from(value: Vec<Expression>) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(ExpressionError::EmptyOperands)
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Operands> for Vec<Expression> {
    fn from(operands: Operands) -> Self {
        operands.0
    }
}

impl<'a> IntoIterator for &'a Operands {
    type Item = &'a Expression;
    type IntoIter = std::slice::Iter<'a, Expression>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Expression
// ============================================================================

/// Boolean condition over loaded entity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Leaf predicate.
    Comparison(Comparison),
    /// All operands must hold.
    And(Operands),
    /// At least one operand must hold.
    Or(Operands),
    /// The operand must not hold.
    Not(Box<Expression>),
}

impl Expression {
    pub fn compare(field: FieldPath, operator: Operator, rhs: impl Into<Operand>) -> Self {
        Expression::Comparison(Comparison {
            field,
            operator,
            rhs: rhs.into(),
        })
    }

    pub fn eq(field: FieldPath, rhs: impl Into<Operand>) -> Self {
        Self::compare(field, Operator::Equals, rhs)
    }

    pub fn ne(field: FieldPath, rhs: impl Into<Operand>) -> Self {
        Self::compare(field, Operator::NotEquals, rhs)
    }

    pub fn gt(field: FieldPath, rhs: impl Into<Operand>) -> Self {
        Self::compare(field, Operator::GreaterThan, rhs)
    }

    pub fn lt(field: FieldPath, rhs: impl Into<Operand>) -> Self {
        Self::compare(field, Operator::LessThan, rhs)
    }

    pub fn ge(field: FieldPath, rhs: impl Into<Operand>) -> Self {
        Self::compare(field, Operator::GreaterEqual, rhs)
    }

    pub fn le(field: FieldPath, rhs: impl Into<Operand>) -> Self {
        Self::compare(field, Operator::LessEqual, rhs)
    }

    /// Conjunction of `operands`.
    ///
    /// # Panics
    ///
    /// Panics if `operands` is empty. Use [`Expression::try_and`] for
    /// untrusted input.
    pub fn and(operands: impl IntoIterator<Item = Expression>) -> Self {
        let operands: Vec<Expression> = operands.into_iter().collect();
        assert!(!operands.is_empty(), "And requires at least one operand");
        Expression::And(Operands(operands))
    }

    /// Disjunction of `operands`.
    ///
    /// # Panics
    ///
    /// Panics if `operands` is empty. Use [`Expression::try_or`] for
    /// untrusted input.
    pub fn or(operands: impl IntoIterator<Item = Expression>) -> Self {
        let operands: Vec<Expression> = operands.into_iter().collect();
        assert!(!operands.is_empty(), "Or requires at least one operand");
        Expression::Or(Operands(operands))
    }

    pub fn try_and(operands: Vec<Expression>) -> Result<Self, ExpressionError> {
        Ok(Expression::And(Operands::try_from(operands)?))
    }

    pub fn try_or(operands: Vec<Expression>) -> Result<Self, ExpressionError> {
        Ok(Expression::Or(Operands::try_from(operands)?))
    }

    pub fn negate(operand: Expression) -> Self {
        Expression::Not(Box::new(operand))
    }

    /// Every table this expression reads, on either side of a comparison.
    pub fn referenced_tables(&self) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        self.collect_tables(&mut tables);
        tables
    }

    fn collect_tables(&self, tables: &mut BTreeSet<String>) {
        match self {
            Expression::Comparison(cmp) => {
                tables.insert(cmp.field.table().to_string());
                if let Operand::Reference(path) = &cmp.rhs {
                    tables.insert(path.table().to_string());
                }
            }
            Expression::And(operands) | Expression::Or(operands) => {
                for operand in operands {
                    operand.collect_tables(tables);
                }
            }
            Expression::Not(operand) => operand.collect_tables(tables),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Comparison(cmp) => write!(f, "{cmp}"),
            Expression::And(operands) | Expression::Or(operands) => {
                let joiner = if matches!(self, Expression::And(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(joiner)?;
                    }
                    write!(f, "{operand}")?;
                }
                f.write_str(")")
            }
            Expression::Not(operand) => match operand.as_ref() {
                Expression::Comparison(cmp) => write!(f, "NOT ({cmp})"),
                other => write!(f, "NOT {other}"),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &str) -> FieldPath {
        FieldPath::parse(path).unwrap()
    }

    #[test]
    fn test_field_path_splits_on_first_dot() {
        let path = field("document.meta.owner");
        assert_eq!(path.table(), "document");
        assert_eq!(path.column(), "meta.owner");
        assert_eq!(path.to_string(), "document.meta.owner");
    }

    #[test]
    fn test_field_path_rejects_malformed() {
        for bad in ["user", ".id", "user.", ""] {
            assert_eq!(
                FieldPath::parse(bad),
                Err(ExpressionError::InvalidFieldPath(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    #[should_panic(expected = "invalid field path parts")]
    fn test_field_path_new_rejects_dotted_table() {
        FieldPath::new("a.b", "c");
    }

    #[test]
    fn test_empty_operands_rejected() {
        assert_eq!(Expression::try_and(vec![]), Err(ExpressionError::EmptyOperands));
        assert_eq!(Expression::try_or(vec![]), Err(ExpressionError::EmptyOperands));
    }

    #[test]
    #[should_panic(expected = "And requires at least one operand")]
    fn test_and_builder_panics_on_empty() {
        Expression::and(Vec::new());
    }

    #[test]
    fn test_referenced_tables_include_references() {
        let expr = Expression::and([
            Expression::eq(field("projectMembership.userId"), field("user.id")),
            Expression::negate(Expression::eq(field("team.plan"), "FREE")),
        ]);
        let tables: Vec<String> = expr.referenced_tables().into_iter().collect();
        assert_eq!(tables, vec!["projectMembership", "team", "user"]);
    }

    #[test]
    fn test_display() {
        let expr = Expression::or([
            Expression::ne(field("document.deletedAt"), Scalar::Null),
            Expression::negate(Expression::eq(field("team.plan"), "FREE")),
        ]);
        assert_eq!(
            expr.to_string(),
            r#"(document.deletedAt != null OR NOT (team.plan = "FREE"))"#
        );
    }

    #[test]
    fn test_operator_ordering_flag() {
        assert!(!Operator::Equals.is_ordering());
        assert!(!Operator::NotEquals.is_ordering());
        assert!(Operator::GreaterThan.is_ordering());
        assert!(Operator::LessEqual.is_ordering());
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"{
            "and": [
                {"comparison": {"field": "user.id", "operator": "eq", "rhs": {"reference": "document.creatorId"}}},
                {"not": {"comparison": {"field": "team.plan", "operator": "eq", "rhs": {"literal": "FREE"}}}}
            ]
        }"#;
        let expr: Expression = serde_json::from_str(json).expect("deserialize expression");
        let expected = Expression::and([
            Expression::eq(field("user.id"), field("document.creatorId")),
            Expression::negate(Expression::eq(field("team.plan"), "FREE")),
        ]);
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_serde_missing_rhs_is_null() {
        let json = r#"{"comparison": {"field": "document.deletedAt", "operator": "ne"}}"#;
        let expr: Expression = serde_json::from_str(json).unwrap();
        assert_eq!(expr, Expression::ne(field("document.deletedAt"), Scalar::Null));
        assert_eq!(serde_json::to_string(&expr).unwrap(), json.replace(' ', ""));
    }

    #[test]
    fn test_serde_rejects_empty_and() {
        let result: Result<Expression, _> = serde_json::from_str(r#"{"and": []}"#);
        assert!(result.is_err());
    }
}
