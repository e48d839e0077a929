//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search).
//! [`HnswIndex`] stores nodes in a dense arena — parallel arrays indexed by
//! internal `u32` id — with a side map from external string ids, so the hot
//! search loop walks contiguous memory instead of chasing hash buckets.

use crate::config;
use crate::document::Document;
use crate::vector::Metric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and
/// memory usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (except layer 0, which uses `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
        }
    }
}

/// HNSW index over shared documents.
///
/// Arena layout: `docs`, `levels`, and `neighbors` are parallel arrays
/// indexed by internal id. Deleted nodes leave a vacant slot (`docs[i] ==
/// None`) with all edges unlinked; slots are compacted on snapshot/restore.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswIndex {
    pub config: HnswConfig,
    /// Similarity metric; scores are higher-is-better for all metrics.
    pub metric: Metric,
    pub dimension: usize,
    // Arena: parallel arrays indexed by internal id. None = vacant slot.
    pub(crate) docs: Vec<Option<Arc<Document>>>,
    pub(crate) levels: Vec<u8>,
    /// `neighbors[node][layer]` = internal ids adjacent at that layer.
    pub(crate) neighbors: Vec<Vec<Vec<u32>>>,
    /// External id → internal id. Live nodes only.
    pub(crate) id_to_internal: HashMap<String, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
    /// Score computations reported by the most recent search, plus any
    /// insert work since. Searches count locally and publish their total in
    /// a single store, so concurrent readers never observe a torn value.
    #[serde(skip)]
    pub(crate) comparisons: AtomicU64,
}

/// Runtime statistics for an HNSW index.
#[derive(Debug, Clone, Serialize)]
pub struct HnswStats {
    /// Number of live nodes.
    pub nodes: usize,
    /// Undirected edge count at all layers (directed count / 2).
    pub total_edges: usize,
    /// Level of the entry point.
    pub max_level: usize,
    /// Largest per-node edge count across all layers.
    pub max_edges_per_node: usize,
    /// Live node count per layer the node participates in at its top level.
    pub level_distribution: BTreeMap<usize, usize>,
    /// Score computations during the most recent search.
    pub last_query_comparisons: u64,
    /// Index configuration.
    pub config: HnswConfig,
}

impl HnswIndex {
    /// Creates a new empty HNSW index with the given dimension, metric, and configuration.
    pub fn new(dimension: usize, metric: Metric, config: HnswConfig) -> Self {
        Self {
            config,
            metric,
            dimension,
            docs: Vec::new(),
            levels: Vec::new(),
            neighbors: Vec::new(),
            id_to_internal: HashMap::new(),
            entry_point: None,
            max_level: 0,
            comparisons: AtomicU64::new(0),
        }
    }

    /// Returns the number of live nodes in the index.
    pub fn len(&self) -> usize {
        self.id_to_internal.len()
    }

    /// Returns `true` if the index contains no live nodes.
    pub fn is_empty(&self) -> bool {
        self.id_to_internal.is_empty()
    }

    /// Returns `true` if a node with the given external id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.id_to_internal.contains_key(id)
    }

    /// Returns the document stored under the given external id.
    pub fn get(&self, id: &str) -> Option<Arc<Document>> {
        let internal = *self.id_to_internal.get(id)?;
        self.docs[internal as usize].clone()
    }

    /// Iterate over live documents.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.docs.iter().filter_map(|slot| slot.as_ref())
    }

    /// Generate a random level for a new node.
    ///
    /// Draws `⌊-ln(U) · mL⌋` with `mL = 1/ln(M)`, producing an exponential
    /// level distribution, capped at `max_layers - 1`.
    pub(crate) fn random_level(&self) -> usize {
        let ml = 1.0 / (self.config.m as f64).ln();
        let u: f64 = rand::random::<f64>().max(f64::MIN_POSITIVE);
        let level = (-u.ln() * ml).floor() as usize;
        level.min(self.config.max_layers - 1)
    }

    /// Document slot for a live internal id.
    #[inline]
    pub(crate) fn doc(&self, internal: u32) -> &Arc<Document> {
        self.docs[internal as usize]
            .as_ref()
            .expect("internal id refers to a live node")
    }

    /// Score a query vector against a stored node, tallying into the
    /// caller's local comparison counter.
    #[inline]
    pub(crate) fn score_to_query(&self, query: &[f64], internal: u32, comparisons: &mut u64) -> f64 {
        *comparisons += 1;
        self.metric.score(query, &self.doc(internal).vector)
    }

    /// Score two stored nodes against each other, tallying into the caller's
    /// local comparison counter.
    #[inline]
    pub(crate) fn score_nodes(&self, a: u32, b: u32, comparisons: &mut u64) -> f64 {
        *comparisons += 1;
        self.metric.score(&self.doc(a).vector, &self.doc(b).vector)
    }

    /// Fold an insert's score computations into the published counter.
    /// Inserts hold `&mut self`, so this touches the atomic non-atomically.
    pub(crate) fn note_insert_comparisons(&mut self, count: u64) {
        *self.comparisons.get_mut() += count;
    }

    /// Maximum edges per node at the given layer.
    #[inline]
    pub(crate) fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }

    /// Compute runtime statistics.
    pub fn stats(&self) -> HnswStats {
        let mut total_directed = 0usize;
        let mut max_edges_per_node = 0usize;
        let mut level_distribution: BTreeMap<usize, usize> = BTreeMap::new();

        for (idx, slot) in self.docs.iter().enumerate() {
            if slot.is_none() {
                continue;
            }
            let node_edges: usize = self.neighbors[idx].iter().map(|layer| layer.len()).sum();
            total_directed += node_edges;
            max_edges_per_node = max_edges_per_node.max(node_edges);
            *level_distribution
                .entry(self.levels[idx] as usize)
                .or_insert(0) += 1;
        }

        HnswStats {
            nodes: self.len(),
            total_edges: total_directed / 2,
            max_level: self.max_level,
            max_edges_per_node,
            level_distribution,
            last_query_comparisons: self.comparisons.load(Ordering::Relaxed),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;

    fn doc(id: &str, vector: Vec<f64>) -> Arc<Document> {
        Arc::new(Document::new(id, vector, Metadata::new()))
    }

    #[test]
    fn test_new_empty_index() {
        let index = HnswIndex::new(8, Metric::Cosine, HnswConfig::default());
        assert_eq!(index.dimension, 8);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.entry_point.is_none());
        assert_eq!(index.stats().nodes, 0);
    }

    #[test]
    fn test_random_level_respects_cap() {
        let index = HnswIndex::new(4, Metric::Cosine, HnswConfig::default());
        for _ in 0..200 {
            assert!(index.random_level() < index.config.max_layers);
        }
    }

    #[test]
    fn test_default_config() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.m_max0, 32);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
    }

    #[test]
    fn test_contains_and_get() {
        let mut index = HnswIndex::new(2, Metric::Cosine, HnswConfig::default());
        index.insert(doc("a", vec![1.0, 0.0]));
        assert!(index.contains("a"));
        assert!(!index.contains("b"));
        assert_eq!(index.get("a").unwrap().vector, vec![1.0, 0.0]);
        assert!(index.get("b").is_none());
    }
}
