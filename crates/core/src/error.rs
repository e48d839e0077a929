//! Error taxonomy for the engram engine.
//!
//! All core errors are surfaced to the caller; none are retried or
//! swallowed. The TTL sweeper logs and continues on per-collection failure.

use thiserror::Error;

/// Errors produced while parsing or evaluating a metadata filter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    /// An operator object contained a key that is not a recognized `$op`.
    #[error("unknown filter operator '{0}'")]
    UnknownOperator(String),

    /// An operator was given an operand of the wrong shape
    /// (e.g. `$in` without a list, `$exists` without a boolean).
    #[error("invalid operand for '{op}': {reason}")]
    InvalidOperand { op: String, reason: String },
}

/// Top-level error type for all engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A collection with this name already exists.
    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    /// No collection with this name.
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Empty name, unrecognized metric/index type, or an out-of-range parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Insert or query vector length does not match the collection dimension.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Missing, empty, or non-finite vector.
    #[error("invalid vector: {0}")]
    InvalidVector(String),

    /// Unparseable TTL value.
    #[error("invalid TTL: {0}")]
    InvalidTtl(String),

    /// Malformed filter condition.
    #[error(transparent)]
    Filter(#[from] FilterError),
}
