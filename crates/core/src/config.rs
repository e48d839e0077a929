//! Global configuration constants for engram.
//!
//! All tuning parameters and input validation limits are defined here.
//! These are compile-time constants; per-collection tuning is handled via
//! [`HnswConfig`](crate::hnsw::HnswConfig) and
//! [`CollectionOptions`](crate::engine::CollectionOptions).

/// Default number of bidirectional links per HNSW node at layers ≥ 1.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Over-fetch multiplier applied to `top_k` when a metadata filter is present.
///
/// HNSW is unaware of metadata, so filtered queries fetch `top_k × factor`
/// candidates (capped at the collection size) before post-filtering.
pub const FILTER_OVERFETCH_FACTOR: usize = 10;

/// Maximum allowed vector dimension per collection.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum length of a collection name in characters.
pub const MAX_COLLECTION_NAME_LEN: usize = 128;

/// Default capacity of the audit ring buffer.
pub const AUDIT_DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default interval (in seconds) between TTL sweeper passes.
pub const TTL_DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
