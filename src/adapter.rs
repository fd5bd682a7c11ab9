//! The persistence adapter: the public-facing write/query surface.
//!
//! A caller submits a named reading; the adapter ensures a connection
//! exists, resolves the target collection, coerces the value to its stored
//! scalar and writes one record. Queries reverse the flow and hand back a
//! lazy cursor of typed records.
//!
//! Two entry points with different failure stances:
//!
//! - [`PersistenceAdapter`]: constructed from validated configuration,
//!   reports every failure as a typed error
//! - [`PersistenceHandle`]: host-embedded wrapper that degrades to a no-op
//!   persistence layer on invalid configuration or an unreachable database
//!   instead of taking the host process down

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{AdapterConfig, ValidatedConfig};
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{QueryError, WriteError};
use crate::record::{FilterPredicate, Record, SourceCatalog, SourceInfo};
use crate::resolver::{CollectionLayout, CollectionResolver};
use crate::store::{Connect, DocumentFilter, DocumentStore, StoredRecord};
use crate::value::{from_native, to_native, SourceState, ValueKind};

// =============================================================================
// Adapter
// =============================================================================

/// Typed time-series persistence adapter over a document store.
pub struct PersistenceAdapter<C: Connect> {
    manager: ConnectionManager<C>,
    resolver: CollectionResolver,
    catalog: Arc<dyn SourceCatalog>,
}

impl<C: Connect> PersistenceAdapter<C> {
    /// Build an adapter from validated configuration.
    ///
    /// Validation is a construction precondition (see
    /// [`AdapterConfig::validate`]); no connection is opened until the first
    /// write or query.
    pub fn new(config: ValidatedConfig, connector: C, catalog: Arc<dyn SourceCatalog>) -> Self {
        let manager = ConnectionManager::new(
            connector,
            config.endpoint,
            config.database,
            &config.layout,
        );
        Self {
            manager,
            resolver: CollectionResolver::new(config.layout),
            catalog,
        }
    }

    /// Stable identifier of this persistence service.
    pub fn service_id(&self) -> &'static str {
        "chronicle"
    }

    /// Human-readable label of this persistence service.
    pub fn label(&self) -> &'static str {
        "Chronicle Time-Series Store"
    }

    /// Default persistence strategies. Extension point; always empty.
    pub fn default_strategies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Per-source persistence metadata. Extension point; always empty.
    pub fn item_info(&self) -> Vec<SourceInfo> {
        Vec::new()
    }

    /// Current connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Close the database handle. The next write or query reconnects.
    pub fn disconnect(&self) {
        self.manager.disconnect();
        self.resolver.reset();
    }

    /// Persist one reading.
    ///
    /// A [`SourceState::Undefined`] reading is skipped without error; an
    /// uninitialized source has nothing worth recording. The record id is
    /// assigned here and never reused; a missing timestamp means "now".
    pub fn write(
        &self,
        source_name: &str,
        display_name: Option<&str>,
        state: SourceState,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), WriteError> {
        let value = match state {
            SourceState::Undefined => {
                tracing::trace!(source = source_name, "skipping undefined reading");
                return Ok(());
            }
            SourceState::Known(value) => value,
        };
        if source_name.is_empty() {
            return Err(WriteError::EmptySource);
        }

        let store = self.manager.ensure_connected().map_err(|e| {
            tracing::warn!(
                source = source_name,
                error = %e,
                "no database connection, cannot persist reading; will retry next time"
            );
            WriteError::NotConnected(e)
        })?;
        let collection = self.resolver.resolve(store.as_ref(), source_name)?;

        let record = StoredRecord {
            id: Uuid::new_v4(),
            source: source_name.to_string(),
            display: display_name.unwrap_or(source_name).to_string(),
            ts: timestamp.unwrap_or_else(Utc::now),
            value: to_native(&value),
        };
        store.insert(&collection, &record)?;

        tracing::debug!(source = source_name, value = %value, "persisted reading");
        Ok(())
    }

    /// Run a filtered range query.
    ///
    /// Results come back as a lazy, finite, non-restartable cursor ordered
    /// by timestamp per `predicate.ordering` and paginated by
    /// `(page_offset * page_size, page_size)`. An operator the store cannot
    /// execute is rejected here, before any round trip.
    pub fn query(&self, predicate: &FilterPredicate) -> Result<QueryCursor, QueryError> {
        if let Some((op, _)) = &predicate.value_comparison {
            if !op.is_supported() {
                return Err(QueryError::UnsupportedOperator(*op));
            }
        }

        // Per-source partitioning has no single collection to scan when the
        // predicate names no source.
        let source_name = predicate.source_name.as_deref();
        if source_name.is_none() && *self.resolver.layout() == CollectionLayout::PerSource {
            tracing::warn!("per-source layout query without a source name returns no history");
            return Ok(QueryCursor::empty());
        }

        let store = self
            .manager
            .ensure_connected()
            .map_err(QueryError::NotConnected)?;
        let collection = self
            .resolver
            .resolve(store.as_ref(), source_name.unwrap_or_default())?;

        let expected_kind = source_name
            .and_then(|s| self.catalog.kind_of(s))
            .unwrap_or(ValueKind::Text);

        let filter = DocumentFilter {
            source: predicate.source_name.clone(),
            value: predicate
                .value_comparison
                .as_ref()
                .map(|(op, value)| (*op, to_native(value))),
            begin: predicate.begin_time,
            end: predicate.end_time,
        };
        let page_size = predicate.effective_page_size();
        let skip = u64::from(predicate.page_offset) * u64::from(page_size);

        let rows = store.find(
            &collection,
            &filter,
            predicate.ordering,
            skip,
            u64::from(page_size),
        )?;
        Ok(QueryCursor::new(rows, expected_kind))
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Lazy cursor over query results.
///
/// Each step coerces one stored scalar back into its semantic value; an
/// unrecognized stored label surfaces as an error rather than a silent
/// substitute. The cursor is consumed by iteration and cannot restart.
#[derive(Debug)]
pub struct QueryCursor {
    rows: std::vec::IntoIter<StoredRecord>,
    expected_kind: ValueKind,
}

impl QueryCursor {
    fn new(rows: Vec<StoredRecord>, expected_kind: ValueKind) -> Self {
        Self {
            rows: rows.into_iter(),
            expected_kind,
        }
    }

    /// Cursor over no records.
    pub fn empty() -> Self {
        Self::new(Vec::new(), ValueKind::Text)
    }
}

impl Iterator for QueryCursor {
    type Item = Result<Record, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        let StoredRecord {
            id,
            source,
            display,
            ts,
            value,
        } = self.rows.next()?;
        Some(
            from_native(value, self.expected_kind)
                .map_err(QueryError::from)
                .map(|value| Record {
                    id,
                    source_name: source,
                    display_name: display,
                    timestamp: ts,
                    value,
                }),
        )
    }
}

// =============================================================================
// Fail-soft handle
// =============================================================================

/// Host-embedded persistence handle with the classic fail-soft stance.
///
/// Built from raw configuration: if validation fails the handle is disabled
/// and the host keeps running: writes report [`WriteError::NotInitialized`]
/// (callers typically log and drop them) and queries yield empty history.
/// An unreachable database likewise turns queries into empty results
/// instead of errors.
pub enum PersistenceHandle<C: Connect> {
    Disabled,
    Ready(PersistenceAdapter<C>),
}

impl<C: Connect> PersistenceHandle<C> {
    pub fn from_config(
        config: &AdapterConfig,
        connector: C,
        catalog: Arc<dyn SourceCatalog>,
    ) -> Self {
        match config.validate() {
            Ok(validated) => {
                PersistenceHandle::Ready(PersistenceAdapter::new(validated, connector, catalog))
            }
            Err(e) => {
                tracing::warn!(error = %e, "persistence disabled: invalid configuration");
                PersistenceHandle::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, PersistenceHandle::Ready(_))
    }

    pub fn write(
        &self,
        source_name: &str,
        display_name: Option<&str>,
        state: SourceState,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), WriteError> {
        match self {
            PersistenceHandle::Disabled => Err(WriteError::NotInitialized),
            PersistenceHandle::Ready(adapter) => {
                adapter.write(source_name, display_name, state, timestamp)
            }
        }
    }

    pub fn query(&self, predicate: &FilterPredicate) -> Result<QueryCursor, QueryError> {
        match self {
            PersistenceHandle::Disabled => Ok(QueryCursor::empty()),
            PersistenceHandle::Ready(adapter) => match adapter.query(predicate) {
                Err(QueryError::NotConnected(e)) => {
                    tracing::warn!(error = %e, "no database connection, returning empty history");
                    Ok(QueryCursor::empty())
                }
                other => other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::record::{CompareOp, NullCatalog};
    use crate::store::MemoryConnector;
    use crate::value::SemanticValue;
    use std::collections::HashMap;

    fn adapter(
        connector: &MemoryConnector,
        collection: Option<&str>,
    ) -> PersistenceAdapter<MemoryConnector> {
        let config = AdapterConfig {
            endpoint: "mem://local".to_string(),
            database: "telemetry".to_string(),
            collection: collection.map(str::to_string),
        };
        PersistenceAdapter::new(
            config.validate().unwrap(),
            connector.clone(),
            Arc::new(NullCatalog),
        )
    }

    #[test]
    fn test_service_metadata() {
        let connector = MemoryConnector::new();
        let adapter = adapter(&connector, Some("readings"));
        assert_eq!(adapter.service_id(), "chronicle");
        assert_eq!(adapter.label(), "Chronicle Time-Series Store");
        assert!(adapter.default_strategies().is_empty());
        assert!(adapter.item_info().is_empty());
    }

    #[test]
    fn test_undefined_reading_is_skipped() {
        let connector = MemoryConnector::new();
        let adapter = adapter(&connector, Some("readings"));

        adapter
            .write("temp_sensor_1", None, SourceState::Undefined, None)
            .unwrap();

        assert_eq!(connector.record_count(), 0);
        // No connection was even needed.
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let connector = MemoryConnector::new();
        let adapter = adapter(&connector, Some("readings"));
        let err = adapter
            .write(
                "",
                None,
                SourceState::Known(SemanticValue::Decimal(1.0)),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, WriteError::EmptySource));
    }

    #[test]
    fn test_write_fails_when_unreachable() {
        let connector = MemoryConnector::new();
        connector.set_unreachable(true);
        let adapter = adapter(&connector, Some("readings"));

        let err = adapter
            .write(
                "temp_sensor_1",
                None,
                SourceState::Known(SemanticValue::Decimal(1.0)),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, WriteError::NotConnected(_)));
        assert_eq!(connector.record_count(), 0);
    }

    #[test]
    fn test_unsupported_operator_is_rejected_before_any_round_trip() {
        let connector = MemoryConnector::new();
        connector.set_unreachable(true);
        let adapter = adapter(&connector, Some("readings"));

        let predicate = FilterPredicate {
            value_comparison: Some((CompareOp::Neq, SemanticValue::Decimal(1.0))),
            ..Default::default()
        };
        // Rejected even though the store is unreachable: no round trip happens.
        let err = adapter.query(&predicate).unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnsupportedOperator(CompareOp::Neq)
        ));
    }

    #[test]
    fn test_per_source_query_without_source_yields_empty() {
        let connector = MemoryConnector::new();
        let adapter = adapter(&connector, None);
        let cursor = adapter.query(&FilterPredicate::default()).unwrap();
        assert_eq!(cursor.count(), 0);
    }

    #[test]
    fn test_strict_query_reports_not_connected() {
        let connector = MemoryConnector::new();
        connector.set_unreachable(true);
        let adapter = adapter(&connector, Some("readings"));
        let err = adapter
            .query(&FilterPredicate::for_source("temp_sensor_1"))
            .unwrap_err();
        assert!(matches!(err, QueryError::NotConnected(_)));
    }

    #[test]
    fn test_handle_disables_on_invalid_config() {
        let config = AdapterConfig {
            endpoint: String::new(),
            database: "telemetry".to_string(),
            collection: None,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let handle =
            PersistenceHandle::from_config(&config, MemoryConnector::new(), Arc::new(NullCatalog));
        assert!(!handle.is_enabled());

        let err = handle
            .write(
                "temp_sensor_1",
                None,
                SourceState::Known(SemanticValue::Decimal(1.0)),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, WriteError::NotInitialized));

        let cursor = handle
            .query(&FilterPredicate::for_source("temp_sensor_1"))
            .unwrap();
        assert_eq!(cursor.count(), 0);
    }

    #[test]
    fn test_handle_query_is_fail_soft_when_unreachable() {
        let connector = MemoryConnector::new();
        connector.set_unreachable(true);
        let config = AdapterConfig {
            endpoint: "mem://local".to_string(),
            database: "telemetry".to_string(),
            collection: Some("readings".to_string()),
        };
        let handle =
            PersistenceHandle::from_config(&config, connector, Arc::new(NullCatalog));
        assert!(handle.is_enabled());

        let cursor = handle
            .query(&FilterPredicate::for_source("temp_sensor_1"))
            .unwrap();
        assert_eq!(cursor.count(), 0);
    }

    #[test]
    fn test_unknown_source_falls_back_to_text() {
        let connector = MemoryConnector::new();
        let mut kinds = HashMap::new();
        kinds.insert("known".to_string(), ValueKind::Decimal);
        let config = AdapterConfig {
            endpoint: "mem://local".to_string(),
            database: "telemetry".to_string(),
            collection: Some("readings".to_string()),
        };
        let adapter = PersistenceAdapter::new(
            config.validate().unwrap(),
            connector.clone(),
            Arc::new(kinds),
        );

        adapter
            .write(
                "mystery",
                None,
                SourceState::Known(SemanticValue::Decimal(21.5)),
                None,
            )
            .unwrap();

        let records: Vec<Record> = adapter
            .query(&FilterPredicate::for_source("mystery"))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, SemanticValue::Text("21.5".to_string()));
    }
}
