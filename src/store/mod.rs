//! Document store abstraction and concrete backends.
//!
//! The adapter talks to its database through two narrow traits:
//!
//! - [`Connect`]: one bounded connection attempt against an endpoint
//! - [`DocumentStore`]: the four data primitives (insert, find, collection
//!   provisioning, close) the persistence core needs
//!
//! Backends:
//! - [`DuckStore`]: embedded DuckDB engine (one table per collection)
//! - [`MemoryStore`]: in-memory store for tests and host-embedded fallbacks

mod duckdb;
mod memory;

pub use self::duckdb::{DuckConnector, DuckStore};
pub use memory::{MemoryConnector, MemoryStore};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ConnectionError, DriverError};
use crate::record::{CompareOp, SortOrder};
use crate::value::NativeScalar;

/// A record as the store holds it: scalar value, no semantic typing.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: Uuid,
    pub source: String,
    pub display: String,
    pub ts: DateTime<Utc>,
    pub value: NativeScalar,
}

/// Store-level filter, already coerced to native scalars.
///
/// Absent fields impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub source: Option<String>,
    pub value: Option<(CompareOp, NativeScalar)>,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Factory producing store handles. One bounded attempt per call, no retry.
pub trait Connect: Send + Sync {
    type Store: DocumentStore;

    /// Open a handle against `endpoint`/`database`.
    ///
    /// On failure the caller stays disconnected and may re-invoke on its own
    /// cadence; no handle must be leaked by a failed attempt.
    fn connect(&self, endpoint: &str, database: &str) -> Result<Self::Store, ConnectionError>;
}

/// The data primitives the persistence core issues against a backend.
///
/// Implementations are safe for concurrent use on one handle; a backend
/// whose native handle is not, serializes internally and documents it.
pub trait DocumentStore: Send + Sync {
    /// Create the collection and its compound `(timestamp, source)` index.
    ///
    /// Idempotent: repeated calls for the same collection are a no-op, never
    /// a duplicate-index error.
    fn ensure_collection(&self, collection: &str) -> Result<(), DriverError>;

    /// Insert one record into `collection`.
    fn insert(&self, collection: &str, record: &StoredRecord) -> Result<(), DriverError>;

    /// Fetch records matching `filter`, ordered by timestamp per `order`,
    /// after `skip` records, at most `limit` records.
    fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        order: SortOrder,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<StoredRecord>, DriverError>;

    /// Release the handle. Safe to call more than once; dropping the store
    /// releases it as well.
    fn close(&self) {}
}
