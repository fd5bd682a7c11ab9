//! In-memory document store.
//!
//! Data lives on the connector (the "server side") and survives
//! disconnect/reconnect cycles, so connection lifecycle semantics are
//! observable in tests. A failure switch makes the endpoint unreachable on
//! demand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ConnectionError, DriverError};
use crate::record::SortOrder;
use crate::store::{Connect, DocumentFilter, DocumentStore, StoredRecord};
use crate::value::NativeScalar;

#[derive(Debug, Default)]
struct ServerState {
    collections: HashMap<String, Vec<StoredRecord>>,
    indexed: HashSet<String>,
}

fn lock_state(state: &Mutex<ServerState>) -> MutexGuard<'_, ServerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector to the in-memory store.
///
/// Cloning shares the backing data, like multiple clients of one server.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<ServerState>>,
    unreachable: Arc<AtomicBool>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connection attempts fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Total number of records across all collections.
    pub fn record_count(&self) -> usize {
        lock_state(&self.state)
            .collections
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Names of collections that exist on the server.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock_state(&self.state)
            .collections
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Connect for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, endpoint: &str, _database: &str) -> Result<MemoryStore, ConnectionError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::Unreachable {
                endpoint: endpoint.to_string(),
                cause: "injected connection failure".to_string(),
            });
        }
        Ok(MemoryStore {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        })
    }
}

/// One session against the in-memory server.
#[derive(Debug)]
pub struct MemoryStore {
    state: Arc<Mutex<ServerState>>,
    closed: AtomicBool,
}

impl MemoryStore {
    fn check_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::Backend("handle is closed".to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn ensure_collection(&self, collection: &str) -> Result<(), DriverError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.collections.entry(collection.to_string()).or_default();
        // HashSet insert is the idempotence: re-provisioning is a no-op.
        state.indexed.insert(collection.to_string());
        Ok(())
    }

    fn insert(&self, collection: &str, record: &StoredRecord) -> Result<(), DriverError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: &DocumentFilter,
        order: SortOrder,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<StoredRecord>, DriverError> {
        self.check_open()?;
        let state = lock_state(&self.state);
        let Some(records) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matching = Vec::new();
        for record in records {
            if let Some(source) = &filter.source {
                if &record.source != source {
                    continue;
                }
            }
            if let Some((op, probe)) = &filter.value {
                if !op.is_supported() {
                    return Err(DriverError::Backend(format!(
                        "operator {op:?} not executable"
                    )));
                }
                let matched = scalar_cmp(&record.value, probe)
                    .and_then(|ord| op.matches(ord))
                    .unwrap_or(false);
                if !matched {
                    continue;
                }
            }
            if let Some(begin) = filter.begin {
                if record.ts < begin {
                    continue;
                }
            }
            if let Some(end) = filter.end {
                if record.ts > end {
                    continue;
                }
            }
            matching.push(record.clone());
        }

        matching.sort_by_key(|r| r.ts);
        if order == SortOrder::Descending {
            matching.reverse();
        }

        Ok(matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Three-way comparison between scalars of the same kind.
///
/// Mismatched kinds are incomparable and never match a predicate.
fn scalar_cmp(stored: &NativeScalar, probe: &NativeScalar) -> Option<std::cmp::Ordering> {
    match (stored, probe) {
        (NativeScalar::Number(a), NativeScalar::Number(b)) => a.partial_cmp(b),
        (NativeScalar::Text(a), NativeScalar::Text(b)) => Some(a.cmp(b)),
        (NativeScalar::Timestamp(a), NativeScalar::Timestamp(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
