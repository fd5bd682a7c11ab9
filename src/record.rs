//! Stored records, query predicates and source metadata.
//!
//! - [`Record`]: one persisted observation, as returned by queries
//! - [`FilterPredicate`]: optional-field query filter with ordering and
//!   pagination (absent fields impose no constraint)
//! - [`CompareOp`] / [`SortOrder`]: predicate building blocks
//! - [`SourceCatalog`]: the host-supplied lookup from source name to the
//!   value kind expected on the read path

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use uuid::Uuid;

use crate::value::{SemanticValue, ValueKind};

// =============================================================================
// Records
// =============================================================================

/// A stored observation.
///
/// The id is assigned at write time and never reused; timestamps carry
/// microsecond resolution; the source name is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque unique identifier, assigned by the adapter on write.
    pub id: Uuid,
    /// Name of the originating source (sensor, device channel, …).
    pub source_name: String,
    /// Human-facing name; defaults to the source name when no alias is given.
    pub display_name: String,
    /// Observation timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// The typed reading.
    pub value: SemanticValue,
}

/// Descriptive metadata for a persisted source.
///
/// Extension point required by hosting platforms; this adapter never
/// populates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub name: String,
    pub count: Option<u64>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

// =============================================================================
// Predicates
// =============================================================================

/// Sort order for query results, applied to the record timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Comparison operator for the value clause of a predicate.
///
/// `Neq` exists because upstream platforms expose it, but no store executes
/// it; the adapter rejects it with a typed error instead of forwarding a
/// literal the backend would choke on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Neq,
}

impl CompareOp {
    /// Whether this operator can be executed by the document store.
    pub fn is_supported(self) -> bool {
        !matches!(self, CompareOp::Neq)
    }

    /// SQL symbol for supported operators.
    pub(crate) fn sql_symbol(self) -> Option<&'static str> {
        match self {
            CompareOp::Eq => Some("="),
            CompareOp::Gt => Some(">"),
            CompareOp::Gte => Some(">="),
            CompareOp::Lt => Some("<"),
            CompareOp::Lte => Some("<="),
            CompareOp::Neq => None,
        }
    }

    /// Evaluate the operator against a three-way comparison result.
    pub(crate) fn matches(self, ord: std::cmp::Ordering) -> Option<bool> {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => Some(ord == Equal),
            CompareOp::Gt => Some(ord == Greater),
            CompareOp::Gte => Some(ord != Less),
            CompareOp::Lt => Some(ord == Less),
            CompareOp::Lte => Some(ord != Greater),
            CompareOp::Neq => None,
        }
    }
}

/// Default page size when the predicate leaves it unset.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on the page size accepted by a single query.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Filtered range query over stored records.
///
/// Absent fields impose no constraint. `page_size` bounds the maximum
/// result count; successive `page_offset` values partition the matching set
/// into disjoint chunks in query order.
#[derive(Debug, Clone)]
pub struct FilterPredicate {
    pub source_name: Option<String>,
    pub value_comparison: Option<(CompareOp, SemanticValue)>,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub ordering: SortOrder,
    pub page_offset: u32,
    pub page_size: u32,
}

impl Default for FilterPredicate {
    fn default() -> Self {
        Self {
            source_name: None,
            value_comparison: None,
            begin_time: None,
            end_time: None,
            ordering: SortOrder::default(),
            page_offset: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterPredicate {
    /// Predicate matching all records of one source, default paging.
    pub fn for_source(source_name: impl Into<String>) -> Self {
        Self {
            source_name: Some(source_name.into()),
            ..Self::default()
        }
    }

    /// Page size clamped to the accepted maximum.
    pub(crate) fn effective_page_size(&self) -> u32 {
        self.page_size.min(MAX_PAGE_SIZE)
    }
}

// =============================================================================
// Source catalog
// =============================================================================

/// Host-supplied lookup from source name to the value kind expected when
/// reading that source's records back.
///
/// Mirrors the item registry of the hosting platform. An unknown source
/// falls back to [`ValueKind::Text`], so readings are still returned as
/// opaque strings rather than dropped.
pub trait SourceCatalog: Send + Sync {
    fn kind_of(&self, source_name: &str) -> Option<ValueKind>;
}

impl SourceCatalog for HashMap<String, ValueKind> {
    fn kind_of(&self, source_name: &str) -> Option<ValueKind> {
        self.get(source_name).copied()
    }
}

/// Catalog that knows no sources; every read uses the `Text` fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCatalog;

impl SourceCatalog for NullCatalog {
    fn kind_of(&self, _source_name: &str) -> Option<ValueKind> {
        None
    }
}
