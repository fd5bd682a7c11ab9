//! Connection lifecycle management.
//!
//! Owns the one database handle of an adapter: lazy connect on first use,
//! idempotent disconnect, reconnect on demand. There is no internal retry or
//! backoff; a failed attempt leaves the manager disconnected and the next
//! `ensure_connected` call tries again, on the caller's cadence.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ConnectionError;
use crate::resolver::CollectionLayout;
use crate::store::{Connect, DocumentStore};

/// Lifecycle of the managed handle.
///
/// `Connecting` is observable only while an attempt is in flight on another
/// thread; `ensure_connected` and `disconnect` themselves are mutually
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

const STATE_DISCONNECTED: u8 = 0;
const STATE_CONNECTING: u8 = 1;
const STATE_CONNECTED: u8 = 2;

/// Manages the lifecycle of one [`DocumentStore`] handle.
pub struct ConnectionManager<C: Connect> {
    connector: C,
    endpoint: String,
    database: String,
    /// Shared-layout collection provisioned at connect time; per-source
    /// collections are provisioned lazily by the resolver instead.
    shared_collection: Option<String>,
    handle: Mutex<Option<Arc<C::Store>>>,
    status: AtomicU8,
}

impl<C: Connect> ConnectionManager<C> {
    pub fn new(
        connector: C,
        endpoint: String,
        database: String,
        layout: &CollectionLayout,
    ) -> Self {
        let shared_collection = match layout {
            CollectionLayout::Shared(name) => Some(name.clone()),
            CollectionLayout::PerSource => None,
        };
        Self {
            connector,
            endpoint,
            database,
            shared_collection,
            handle: Mutex::new(None),
            status: AtomicU8::new(STATE_DISCONNECTED),
        }
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<Arc<C::Store>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        match self.status.load(Ordering::SeqCst) {
            STATE_CONNECTING => ConnectionState::Connecting,
            STATE_CONNECTED => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Whether a handle is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Return the cached handle, connecting first if necessary.
    ///
    /// One bounded attempt: on failure the manager stays disconnected and no
    /// handle is leaked. For the shared collection layout the compound index
    /// is provisioned here, once per connection.
    pub fn ensure_connected(&self) -> Result<Arc<C::Store>, ConnectionError> {
        let mut guard = self.lock_handle();
        if let Some(handle) = guard.as_ref() {
            return Ok(Arc::clone(handle));
        }

        self.status.store(STATE_CONNECTING, Ordering::SeqCst);
        let store = match self.connector.connect(&self.endpoint, &self.database) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                self.status.store(STATE_DISCONNECTED, Ordering::SeqCst);
                return Err(e);
            }
        };

        if let Some(collection) = &self.shared_collection {
            if let Err(e) = store.ensure_collection(collection) {
                // Handle is dropped here, not cached: a half-provisioned
                // connection must not leak into later calls.
                self.status.store(STATE_DISCONNECTED, Ordering::SeqCst);
                return Err(ConnectionError::Unreachable {
                    endpoint: self.endpoint.clone(),
                    cause: format!("failed to provision collection {collection:?}: {e}"),
                });
            }
        }

        tracing::debug!(endpoint = %self.endpoint, database = %self.database, "connected");
        *guard = Some(Arc::clone(&store));
        self.status.store(STATE_CONNECTED, Ordering::SeqCst);
        Ok(store)
    }

    /// Close and drop the handle. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        let mut guard = self.lock_handle();
        if let Some(handle) = guard.take() {
            handle.close();
            tracing::debug!(endpoint = %self.endpoint, "disconnected");
        }
        self.status.store(STATE_DISCONNECTED, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConnector;

    fn manager(connector: &MemoryConnector) -> ConnectionManager<MemoryConnector> {
        ConnectionManager::new(
            connector.clone(),
            "mem://local".to_string(),
            "telemetry".to_string(),
            &CollectionLayout::PerSource,
        )
    }

    #[test]
    fn test_lazy_connect_and_cached_handle() {
        let connector = MemoryConnector::new();
        let manager = manager(&connector);
        assert!(!manager.is_connected());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let first = manager.ensure_connected().unwrap();
        assert!(manager.is_connected());
        let second = manager.ensure_connected().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_attempt_leaves_disconnected() {
        let connector = MemoryConnector::new();
        let manager = manager(&connector);
        connector.set_unreachable(true);

        assert!(manager.ensure_connected().is_err());
        assert!(!manager.is_connected());

        // Next attempt succeeds once the endpoint is back.
        connector.set_unreachable(false);
        assert!(manager.ensure_connected().is_ok());
        assert!(manager.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let connector = MemoryConnector::new();
        let manager = manager(&connector);
        manager.ensure_connected().unwrap();

        manager.disconnect();
        assert!(!manager.is_connected());
        manager.disconnect();
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_shared_layout_provisions_collection_at_connect() {
        let connector = MemoryConnector::new();
        let manager = ConnectionManager::new(
            connector.clone(),
            "mem://local".to_string(),
            "telemetry".to_string(),
            &CollectionLayout::Shared("readings".to_string()),
        );
        manager.ensure_connected().unwrap();
        assert_eq!(connector.collection_names(), vec!["readings".to_string()]);
    }
}
