//! Chronicle - Typed Time-Series Persistence Adapter
//!
//! Chronicle persists typed readings from named sources (sensors, device
//! channels) into a document store and translates stored scalars back into
//! typed historical records on query. It is the persistence layer of a
//! larger home-automation platform; the platform's item model, registry and
//! lifecycle live elsewhere.
//!
//! # Architecture
//!
//! - **Coercion table**: bidirectional mapping between semantic value kinds
//!   and storage-native scalars ([`value`])
//! - **Connection manager**: lazy connect, idempotent disconnect,
//!   reconnect-on-demand over one handle ([`connection`])
//! - **Collection resolver**: shared vs. per-source record partitioning
//!   with idempotent index provisioning ([`resolver`])
//! - **Persistence adapter**: the write/query surface, plus a fail-soft
//!   handle for host embedding ([`adapter`])
//! - **Store backends**: embedded DuckDB and an in-memory store behind the
//!   same driver seam ([`store`])
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chronicle::{
//!     AdapterConfig, DuckConnector, FilterPredicate, NullCatalog,
//!     PersistenceAdapter, SemanticValue, SourceState,
//! };
//!
//! let config = AdapterConfig::load("persistence.yaml")?.validate()?;
//! let adapter = PersistenceAdapter::new(config, DuckConnector, Arc::new(NullCatalog));
//!
//! adapter.write(
//!     "temp_sensor_1",
//!     None,
//!     SourceState::Known(SemanticValue::Decimal(21.5)),
//!     None,
//! )?;
//! for record in adapter.query(&FilterPredicate::for_source("temp_sensor_1"))? {
//!     println!("{:?}", record?);
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod connection;
pub mod error;
pub mod headers;
pub mod record;
pub mod resolver;
pub mod store;
pub mod value;

pub use adapter::{PersistenceAdapter, PersistenceHandle, QueryCursor};
pub use config::{AdapterConfig, ValidatedConfig};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{
    CoercionError, ConfigError, ConnectionError, DriverError, QueryError, WriteError,
};
pub use headers::decorate_streaming_headers;
pub use record::{
    CompareOp, FilterPredicate, NullCatalog, Record, SortOrder, SourceCatalog, SourceInfo,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use resolver::{CollectionLayout, CollectionResolver};
pub use store::{
    Connect, DocumentFilter, DocumentStore, DuckConnector, DuckStore, MemoryConnector,
    MemoryStore, StoredRecord,
};
pub use value::{
    from_native, to_native, NativeScalar, ScalarKind, SemanticValue, SourceState, ValueKind,
};
