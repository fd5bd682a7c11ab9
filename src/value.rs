//! Semantic values and the bidirectional type coercion table.
//!
//! A [`SemanticValue`] is the platform-level typed representation of a
//! reading, independent of how the store encodes it. A [`NativeScalar`] is
//! what the document store actually holds: a number, a string, or a
//! timestamp, mirroring the double / string / date encodings of classic
//! home-automation persistence backends.
//!
//! Coercion is an exhaustive match in both directions. Adding a new value
//! kind is a compile-time exhaustiveness error here, not a silently falling
//! through type-dispatch chain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::CoercionError;

/// Two-state labels recognized on the read path.
///
/// Writes always emit `ON`/`OFF`; reads additionally accept the
/// open-closed contact labels persisted by older deployments.
const LABEL_ON: &str = "ON";
const LABEL_OFF: &str = "OFF";
const LABEL_OPEN: &str = "OPEN";
const LABEL_CLOSED: &str = "CLOSED";

// =============================================================================
// Semantic values
// =============================================================================

/// A typed reading supplied by an upstream data source.
///
/// Exactly one variant is active. Coercion to and from [`NativeScalar`] is
/// total for all five kinds; `Text` is the lossy fallback for anything the
/// model does not cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SemanticValue {
    /// Two-state value (switch/contact semantics). Stored as a label string.
    Boolean(bool),
    /// Percentage in `[0, 100]`. Stored as a number; integral percentages
    /// round-trip exactly.
    Percentage(f64),
    /// Numeric reading. Stored as a double; double precision is the
    /// documented ceiling for exactness.
    Decimal(f64),
    /// Opaque text. Fallback kind; round-trips only with itself.
    Text(String),
    /// Point in time, always UTC on both the write and the read path.
    Instant(DateTime<Utc>),
}

impl SemanticValue {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            SemanticValue::Boolean(_) => ValueKind::Boolean,
            SemanticValue::Percentage(_) => ValueKind::Percentage,
            SemanticValue::Decimal(_) => ValueKind::Decimal,
            SemanticValue::Text(_) => ValueKind::Text,
            SemanticValue::Instant(_) => ValueKind::Instant,
        }
    }
}

impl std::fmt::Display for SemanticValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticValue::Boolean(true) => f.write_str(LABEL_ON),
            SemanticValue::Boolean(false) => f.write_str(LABEL_OFF),
            SemanticValue::Percentage(p) => write!(f, "{p}"),
            SemanticValue::Decimal(d) => write!(f, "{d}"),
            SemanticValue::Text(s) => f.write_str(s),
            SemanticValue::Instant(t) => {
                f.write_str(&t.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}

/// Kind tags for [`SemanticValue`], used to drive the read-path coercion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ValueKind {
    Boolean,
    Percentage,
    Decimal,
    Text,
    Instant,
}

/// Upstream source state, including the uninitialized case.
///
/// `Undefined` models a source that has not produced a reading yet; the
/// adapter skips such writes without error.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    /// No reading available. Never persisted.
    Undefined,
    /// A concrete reading.
    Known(SemanticValue),
}

// =============================================================================
// Native scalars
// =============================================================================

/// A storage-native scalar as held by the document store.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeScalar {
    /// Double-precision number.
    Number(f64),
    /// UTF-8 string.
    Text(String),
    /// UTC timestamp with microsecond resolution.
    Timestamp(DateTime<Utc>),
}

impl NativeScalar {
    /// The kind tag of this scalar.
    pub fn kind(&self) -> ScalarKind {
        match self {
            NativeScalar::Number(_) => ScalarKind::Number,
            NativeScalar::Text(_) => ScalarKind::Text,
            NativeScalar::Timestamp(_) => ScalarKind::Timestamp,
        }
    }

    /// Canonical string form, used for the `Text` fallback on reads.
    pub fn canonical_string(&self) -> String {
        match self {
            NativeScalar::Number(n) => n.to_string(),
            NativeScalar::Text(s) => s.clone(),
            NativeScalar::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

/// Kind tags for [`NativeScalar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    Number,
    Text,
    Timestamp,
}

// =============================================================================
// Coercion table
// =============================================================================

/// Encode a semantic value as its storage-native scalar. Total and pure.
pub fn to_native(value: &SemanticValue) -> NativeScalar {
    match value {
        SemanticValue::Boolean(true) => NativeScalar::Text(LABEL_ON.to_string()),
        SemanticValue::Boolean(false) => NativeScalar::Text(LABEL_OFF.to_string()),
        SemanticValue::Percentage(p) => NativeScalar::Number(*p),
        SemanticValue::Decimal(d) => NativeScalar::Number(*d),
        SemanticValue::Text(s) => NativeScalar::Text(s.clone()),
        SemanticValue::Instant(t) => NativeScalar::Timestamp(*t),
    }
}

/// Decode a stored scalar back into the semantic value of `expected` kind.
///
/// `ValueKind::Text` accepts any scalar and wraps its canonical string form
/// (lossy by design). For the other kinds a mismatched scalar yields
/// [`CoercionError::UnsupportedKind`]; a two-state label outside the
/// recognized set yields [`CoercionError::UnknownLabel`] instead of a silent
/// substitute.
pub fn from_native(scalar: NativeScalar, expected: ValueKind) -> Result<SemanticValue, CoercionError> {
    match expected {
        ValueKind::Text => Ok(SemanticValue::Text(scalar.canonical_string())),
        ValueKind::Boolean => match scalar {
            NativeScalar::Text(s) => match s.as_str() {
                LABEL_ON | LABEL_OPEN => Ok(SemanticValue::Boolean(true)),
                LABEL_OFF | LABEL_CLOSED => Ok(SemanticValue::Boolean(false)),
                _ => Err(CoercionError::UnknownLabel(s)),
            },
            other => Err(CoercionError::UnsupportedKind {
                expected,
                found: other.kind(),
            }),
        },
        ValueKind::Percentage => match scalar {
            NativeScalar::Number(n) if (0.0..=100.0).contains(&n) => {
                Ok(SemanticValue::Percentage(n))
            }
            NativeScalar::Number(_) => Err(CoercionError::UnsupportedKind {
                expected,
                found: ScalarKind::Number,
            }),
            other => Err(CoercionError::UnsupportedKind {
                expected,
                found: other.kind(),
            }),
        },
        ValueKind::Decimal => match scalar {
            NativeScalar::Number(n) => Ok(SemanticValue::Decimal(n)),
            other => Err(CoercionError::UnsupportedKind {
                expected,
                found: other.kind(),
            }),
        },
        ValueKind::Instant => match scalar {
            NativeScalar::Timestamp(t) => Ok(SemanticValue::Instant(t)),
            other => Err(CoercionError::UnsupportedKind {
                expected,
                found: other.kind(),
            }),
        },
    }
}
