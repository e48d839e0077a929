//! Core document types for engram.
//!
//! A `Document` is the unit of storage: a unique string id, an embedding
//! vector, and arbitrary key-value metadata. `MetadataValue` is the tagged
//! variant used for metadata and filter operands. Reserved keys installed by
//! the tenant wrapper and the TTL machinery live here as constants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata key installed by the tenant wrapper. Holds the owning tenant id.
pub const TENANT_ID_KEY: &str = "_tenant_id";

/// Metadata key holding the absolute expiration timestamp (epoch milliseconds).
pub const TTL_EXPIRES_KEY: &str = "_ttl_expires";

/// Metadata key holding the original human-readable TTL string, for observability.
pub const TTL_DURATION_KEY: &str = "_ttl_duration";

/// A typed metadata value attached to a document.
///
/// Used for metadata filtering in search queries. Uses the default
/// externally-tagged serde representation for bincode compatibility;
/// [`MetadataValue::from_json`] / [`MetadataValue::to_json`] convert
/// to and from the untagged JSON form at API boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// JSON null.
    Null,
    /// Boolean value (`true` / `false`).
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list of values.
    List(Vec<MetadataValue>),
    /// Nested string-keyed map.
    Map(HashMap<String, MetadataValue>),
}

/// Document metadata: a mapping from string keys to [`MetadataValue`].
pub type Metadata = HashMap<String, MetadataValue>;

impl MetadataValue {
    /// Convert an untagged JSON value into a `MetadataValue`.
    ///
    /// Numbers become `Int` when they are exact integers, `Float` otherwise.
    pub fn from_json(value: &serde_json::Value) -> MetadataValue {
        match value {
            serde_json::Value::Null => MetadataValue::Null,
            serde_json::Value::Bool(b) => MetadataValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetadataValue::Int(i)
                } else {
                    MetadataValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => MetadataValue::Str(s.clone()),
            serde_json::Value::Array(items) => {
                MetadataValue::List(items.iter().map(MetadataValue::from_json).collect())
            }
            serde_json::Value::Object(map) => MetadataValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), MetadataValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back to the untagged JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetadataValue::Null => serde_json::Value::Null,
            MetadataValue::Bool(b) => serde_json::Value::Bool(*b),
            MetadataValue::Int(i) => serde_json::Value::from(*i),
            MetadataValue::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            MetadataValue::Str(s) => serde_json::Value::String(s.clone()),
            MetadataValue::List(items) => {
                serde_json::Value::Array(items.iter().map(MetadataValue::to_json).collect())
            }
            MetadataValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Numeric view of the value, coercing `Int` to `f64`. `None` for non-numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String view of the value. `None` for non-strings.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Str(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Str(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Int(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        MetadataValue::Float(f)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// A stored document: unique id, embedding vector, and metadata.
///
/// Documents are never mutated in place — re-inserting an existing id is
/// delete-then-insert at the engine boundary. Stored as `Arc<Document>` and
/// shared between the collection document store and the HNSW graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the collection.
    pub id: String,
    /// Embedding vector. Length equals the collection dimension.
    pub vector: Vec<f64>,
    /// Arbitrary key-value metadata, including reserved keys.
    pub metadata: Metadata,
}

impl Document {
    /// Creates a new document.
    pub fn new(id: impl Into<String>, vector: Vec<f64>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }

    /// The owning tenant id, if the document is tenant-tagged.
    pub fn tenant_id(&self) -> Option<&str> {
        self.metadata.get(TENANT_ID_KEY).and_then(|v| v.as_str())
    }

    /// Absolute expiration timestamp in epoch milliseconds, if a TTL is set.
    pub fn ttl_expires(&self) -> Option<i64> {
        match self.metadata.get(TTL_EXPIRES_KEY)? {
            MetadataValue::Int(ms) => Some(*ms),
            MetadataValue::Float(ms) => Some(*ms as i64),
            _ => None,
        }
    }

    /// Whether the document's TTL has elapsed at time `now` (epoch ms).
    pub fn is_expired(&self, now: i64) -> bool {
        self.ttl_expires().is_some_and(|exp| exp <= now)
    }
}
