//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! Layered proximity graph: upper layers are sparse long-range shortcuts,
//! layer 0 contains every node. Nodes live in a dense arena addressed by
//! internal `u32` ids with a side map from external string ids, keeping the
//! hot search loop on contiguous arrays.
//!
//! Supports online insertion with heuristic neighbor selection, beam-search
//! queries, hard deletion with edge unlinking, runtime statistics, and a
//! faithful snapshot/restore round trip.

/// Hard deletion: edge unlinking, slot vacating, entry-point re-election.
mod delete;
/// Graph structure, configuration, arena storage, and statistics.
mod graph;
/// Insertion with bidirectional connections and diversity-aware pruning.
mod insert;
/// Layer beam search and multi-layer top-k search.
mod search;
/// Snapshot format and checksummed byte encoding.
mod snapshot;
/// Epoch-stamped visited set for graph traversal.
mod visited;

pub use graph::{HnswConfig, HnswIndex, HnswStats};
pub use search::{SearchHit, SearchOutcome};
pub use snapshot::{decode_snapshot, encode_snapshot, HnswSnapshot, NodeSnapshot, SnapshotError};
