//! Error types for the persistence layer.
//!
//! Each concern carries its own enum so callers can match on the underlying
//! cause. Connection failures are reported as typed results, never panics;
//! the adapter performs no internal retry; re-invoking on the caller's own
//! cadence is part of the contract.

use thiserror::Error;

use crate::record::CompareOp;
use crate::value::{ScalarKind, ValueKind};

/// Errors raised while establishing a database connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The configured endpoint could not be reached in one bounded attempt.
    #[error("database endpoint '{endpoint}' unreachable: {cause}")]
    Unreachable { endpoint: String, cause: String },
}

/// Errors raised by a concrete document store backend.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The underlying storage engine rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored row could not be decoded (missing value column, bad id, …).
    #[error("invalid stored row: {0}")]
    InvalidRow(String),
}

impl From<duckdb::Error> for DriverError {
    fn from(e: duckdb::Error) -> Self {
        DriverError::Backend(e.to_string())
    }
}

/// Errors raised by [`crate::PersistenceAdapter::write`].
#[derive(Debug, Error)]
pub enum WriteError {
    /// No database connection could be established for this write.
    #[error("not connected: {0}")]
    NotConnected(#[source] ConnectionError),

    /// The adapter was built from invalid configuration and is disabled.
    #[error("persistence adapter is not initialized")]
    NotInitialized,

    /// Source names identify the record's origin and must not be empty.
    #[error("source name must not be empty")]
    EmptySource,

    /// The backend rejected the insert.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors raised by [`crate::PersistenceAdapter::query`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// The predicate carries a comparison operator the store cannot execute.
    #[error("unsupported comparison operator {0:?}")]
    UnsupportedOperator(CompareOp),

    /// No database connection could be established for this query.
    #[error("not connected: {0}")]
    NotConnected(#[source] ConnectionError),

    /// A stored scalar could not be read back as the expected value kind.
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// The backend rejected the find.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors raised when translating between semantic values and stored scalars.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoercionError {
    /// A stored two-state label is outside the recognized set.
    #[error("unrecognized state label {0:?}")]
    UnknownLabel(String),

    /// The stored scalar cannot represent the expected value kind.
    #[error("stored {found} cannot be read as {expected}")]
    UnsupportedKind { expected: ValueKind, found: ScalarKind },
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}
