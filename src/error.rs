//! Error types for dynatable
//!
//! Provides a unified error type for all operations.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::value::Record;

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for dynatable operations
#[derive(Debug, Error)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors (raised before any backend call)
    // -------------------------------------------------------------------------
    #[error("Key data cannot have empty values: field '{field}'")]
    EmptyKeyValue { field: String },

    #[error("Key fields incorrect: got {got:?}, expecting {expected:?}")]
    KeyFieldsMismatch {
        got: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Looking up one value, but missing sort key '{sort_key}'")]
    MissingSortKey { sort_key: String },

    #[error("Field not partition key or index: {field}")]
    UnknownKeyField { field: String },

    #[error("Conditions only allowed on sort key {sort_key:?}, got: {fields:?}")]
    ConditionOnNonSortKey {
        sort_key: Option<String>,
        fields: Vec<String>,
    },

    #[error("Expecting '{field}' field in record")]
    MissingKeyField { field: String },

    #[error("{operation} takes exact key values, got conditions on: {fields:?}")]
    PredicateNotAllowed {
        operation: String,
        fields: Vec<String>,
    },

    #[error("{operation} must query the table, not index '{index}'")]
    IndexLookupNotAllowed { operation: String, index: String },

    #[error("Invalid limit: {0}")]
    InvalidLimit(usize),

    #[error("Invalid pagination token: {0}")]
    InvalidPaginationToken(String),

    #[error("Invalid resume token: {0}")]
    InvalidResumeToken(String),

    // -------------------------------------------------------------------------
    // Type Errors (update operators in the local engine)
    // -------------------------------------------------------------------------
    #[error("Expected {expected} in '{field}', got: {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Invalid update for '{field}': {reason}")]
    InvalidUpdate { field: String, reason: String },

    // -------------------------------------------------------------------------
    // Backend Errors
    // -------------------------------------------------------------------------
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------
    #[error("Operation cancelled after {completed} completed steps")]
    Cancelled { completed: usize },

    #[error("Batch read cancelled with {} ids resolved", .resolved.len())]
    BatchGetCancelled { resolved: BTreeMap<String, Record> },

    // -------------------------------------------------------------------------
    // Cursor Errors
    // -------------------------------------------------------------------------
    #[error("Cursor is at end of data")]
    CursorExhausted,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for TableError {
    fn from(err: serde_json::Error) -> Self {
        TableError::Serialization(err.to_string())
    }
}

impl TableError {
    /// Whether this error is a caller mistake detected before touching a backend
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TableError::EmptyKeyValue { .. }
                | TableError::KeyFieldsMismatch { .. }
                | TableError::MissingSortKey { .. }
                | TableError::UnknownKeyField { .. }
                | TableError::ConditionOnNonSortKey { .. }
                | TableError::MissingKeyField { .. }
                | TableError::PredicateNotAllowed { .. }
                | TableError::IndexLookupNotAllowed { .. }
                | TableError::InvalidLimit(_)
                | TableError::InvalidPaginationToken(_)
                | TableError::InvalidResumeToken(_)
        )
    }
}
