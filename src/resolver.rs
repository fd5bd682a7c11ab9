//! Collection resolution.
//!
//! Decides, per write or query, which collection holds a source's records:
//! one shared collection for everything, or one collection per source.
//! Per-source collections are created with their compound index on first
//! access; provisioning is idempotent at the store, with a memo here to
//! avoid redundant round trips. The memo is reset on disconnect so a fresh
//! session re-provisions.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::DriverError;
use crate::store::DocumentStore;

/// How records are partitioned across collections.
///
/// Shared mode trades a larger index for single-collection simplicity;
/// per-source mode trades index simplicity for N collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionLayout {
    /// All sources in the one named collection.
    Shared(String),
    /// One collection per source, named after it.
    PerSource,
}

/// Resolves source names to collection names under the active layout.
pub struct CollectionResolver {
    layout: CollectionLayout,
    provisioned: Mutex<HashSet<String>>,
}

impl CollectionResolver {
    pub fn new(layout: CollectionLayout) -> Self {
        Self {
            layout,
            provisioned: Mutex::new(HashSet::new()),
        }
    }

    pub fn layout(&self) -> &CollectionLayout {
        &self.layout
    }

    fn lock_provisioned(&self) -> MutexGuard<'_, HashSet<String>> {
        self.provisioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Collection holding `source_name`'s records, provisioning it first if
    /// this session has not seen it yet.
    ///
    /// Shared collections are provisioned at connect time by the connection
    /// manager, so the shared arm never touches the store here.
    pub fn resolve<S: DocumentStore>(
        &self,
        store: &S,
        source_name: &str,
    ) -> Result<String, DriverError> {
        match &self.layout {
            CollectionLayout::Shared(name) => Ok(name.clone()),
            CollectionLayout::PerSource => {
                let name = collection_name_for(source_name);
                let mut seen = self.lock_provisioned();
                if !seen.contains(&name) {
                    store.ensure_collection(&name)?;
                    seen.insert(name.clone());
                }
                Ok(name)
            }
        }
    }

    /// Forget which collections this session provisioned. Called on
    /// disconnect; the next session re-provisions on demand.
    pub fn reset(&self) {
        self.lock_provisioned().clear();
    }
}

/// Map a source name onto a storage identifier.
///
/// Source names may carry characters the store cannot use in identifiers;
/// anything outside `[A-Za-z0-9_]` becomes an underscore.
fn collection_name_for(source_name: &str) -> String {
    source_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
