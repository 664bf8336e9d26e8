//! The data-loading contract the engine consumes.
//!
//! Loaders live outside this crate. The engine asks for a set of tables once
//! per decision; the loader returns whatever subset it can resolve for the
//! given resource and subject. Omitting a table is not an error: predicates
//! on it evaluate to UNKNOWN.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::data::LoadedData;

/// Fatal loader failure. Never turned into a deny.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The engine requested a table the loader does not know about. This is
    /// a policy configuration error, not missing data.
    #[error("unknown table '{table}'")]
    UnknownTable { table: String },

    /// The backing store failed.
    #[error("data source failure: {message}")]
    Source { message: String },
}

impl LoadError {
    pub fn unknown_table(table: impl Into<String>) -> Self {
        LoadError::UnknownTable {
            table: table.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        LoadError::Source {
            message: message.into(),
        }
    }
}

/// Resolves requested tables for one resource/subject pair.
///
/// Implementations may cache, block, or ignore tables outside
/// `required_tables`; the engine calls `load_data` at most once per
/// decision.
pub trait DataLoader: Send + Sync {
    /// What is being accessed.
    type Resource: ?Sized;
    /// Who is asking.
    type Subject: ?Sized;

    /// Loads the rows for `required_tables`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] for unknown tables or backing-store failures.
    fn load_data(
        &self,
        resource: &Self::Resource,
        subject: &Self::Subject,
        required_tables: &BTreeSet<String>,
    ) -> Result<LoadedData, LoadError>;
}

impl<L: DataLoader + ?Sized> DataLoader for &L {
    type Resource = L::Resource;
    type Subject = L::Subject;

    fn load_data(
        &self,
        resource: &Self::Resource,
        subject: &Self::Subject,
        required_tables: &BTreeSet<String>,
    ) -> Result<LoadedData, LoadError> {
        (**self).load_data(resource, subject, required_tables)
    }
}

impl<L: DataLoader + ?Sized> DataLoader for Arc<L> {
    type Resource = L::Resource;
    type Subject = L::Subject;

    fn load_data(
        &self,
        resource: &Self::Resource,
        subject: &Self::Subject,
        required_tables: &BTreeSet<String>,
    ) -> Result<LoadedData, LoadError> {
        (**self).load_data(resource, subject, required_tables)
    }
}
