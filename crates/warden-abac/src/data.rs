//! Per-decision entity data handed from a loader to the evaluator.
//!
//! A [`LoadedData`] is built fresh for every decision and discarded after
//! evaluation. A table missing from it means the loader could not resolve
//! that table for the current subject and resource, which is different from
//! a table that is present but lacks a column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expression::FieldPath;
use crate::scalar::{Scalar, ScalarError};

// ============================================================================
// Row
// ============================================================================

/// One entity row: column name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    columns: BTreeMap<String, Scalar>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column (builder style).
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for Row {
    type Error = ScalarError;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut row = Row::new();
        for (column, value) in map {
            row.insert(column, Scalar::try_from(value)?);
        }
        Ok(row)
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

// ============================================================================
// LoadedData
// ============================================================================

/// Tables resolved by a loader for one decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadedData {
    tables: BTreeMap<String, Row>,
}

impl LoadedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table's row.
    pub fn insert_row(&mut self, table: impl Into<String>, row: Row) {
        self.tables.insert(table.into(), row);
    }

    /// Builder form of [`LoadedData::insert_row`].
    #[must_use]
    pub fn with_row(mut self, table: impl Into<String>, row: Row) -> Self {
        self.insert_row(table, row);
        self
    }

    pub fn row(&self, table: &str) -> Option<&Row> {
        self.tables.get(table)
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Names of the tables present, in sorted order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Resolves a field reference.
    ///
    /// Returns `None` if the table was not loaded. A loaded table without the
    /// column resolves to [`Scalar::Null`].
    pub fn resolve(&self, path: &FieldPath) -> Option<Scalar> {
        self.tables
            .get(path.table())
            .map(|row| row.get(path.column()).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Tests
// ============================================================================
