//! Collection layer: a document store coupled with an HNSW or brute-force index.
//!
//! A [`Collection`] is a cloneable handle to shared, lock-protected state.
//! Queries route to the HNSW graph for `hnsw` collections (unless the caller
//! forces the flat path) and brute-force scoring otherwise. The brute-force
//! path applies the metadata filter before scoring; the HNSW path over-fetches
//! and post-filters, since the graph is unaware of metadata. Both paths hide
//! TTL-expired documents.

use crate::config;
use crate::document::{Document, Metadata};
use crate::engine::QueryOptions;
use crate::error::EngineError;
use crate::hnsw::{HnswConfig, HnswIndex, SearchHit};
use crate::ttl;
use crate::vector::Metric;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Index backing a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// HNSW approximate nearest neighbor graph.
    Hnsw,
    /// Brute-force scan over all documents.
    Flat,
}

/// Which search path produced a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMethod {
    Hnsw,
    Flat,
}

/// Operational counters for a collection.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub inserts: AtomicU64,
    pub deletes: AtomicU64,
    pub queries: AtomicU64,
}

/// Summary of a collection, returned by the engine's lifecycle calls.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub index_type: IndexType,
    /// Live document count.
    pub count: usize,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
}

/// One matched document in a query response.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub id: String,
    /// Similarity score under the collection metric. Higher is better.
    pub score: f64,
    /// Present unless the query opted out via `include_vectors: false`.
    pub vector: Option<Vec<f64>>,
    pub metadata: Metadata,
}

/// Response envelope for a query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// Matches sorted by descending score, at most `top_k`.
    pub results: Vec<QueryResult>,
    /// Wall-clock time spent in the engine, milliseconds.
    pub elapsed_ms: f64,
    /// Score computations performed.
    pub comparisons: u64,
    /// Collection size at query time.
    pub total: usize,
    /// Which search path ran.
    pub method: QueryMethod,
}

/// Internal state of a collection, protected by a `RwLock`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionData {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub index_type: IndexType,
    /// Document store; shares `Arc<Document>` with the graph.
    pub documents: HashMap<String, Arc<Document>>,
    /// Present iff `index_type == Hnsw`.
    pub hnsw: Option<HnswIndex>,
    pub stats: CollectionStats,
    pub created_at: i64,
}

/// A cloneable handle to shared collection state.
///
/// All operations acquire either a read or a write lock on the internal
/// [`CollectionData`]. Cloning produces a new handle to the same data.
#[derive(Debug, Clone)]
pub struct Collection {
    pub data: Arc<RwLock<CollectionData>>,
}

impl Collection {
    /// Creates a new empty collection.
    pub fn new(
        name: String,
        dimension: usize,
        metric: Metric,
        index_type: IndexType,
        hnsw_config: HnswConfig,
    ) -> Self {
        let hnsw = match index_type {
            IndexType::Hnsw => Some(HnswIndex::new(dimension, metric, hnsw_config)),
            IndexType::Flat => None,
        };
        Self {
            data: Arc::new(RwLock::new(CollectionData {
                name,
                dimension,
                metric,
                index_type,
                documents: HashMap::new(),
                hnsw,
                stats: CollectionStats::default(),
                created_at: ttl::now_ms(),
            })),
        }
    }

    /// Insert a document, replacing any existing document with the same id.
    ///
    /// Replacement is delete-then-insert: the old node is unlinked from the
    /// graph before the new one is added.
    pub fn insert_document(&self, doc: Document) -> Result<(), EngineError> {
        let mut data = self.data.write();
        insert_locked(&mut data, doc)
    }

    /// Insert a batch of documents under one write lock.
    ///
    /// No reader observes a partially applied batch mid-flight. A validation
    /// failure stops the batch; documents inserted before it stay.
    pub fn insert_many(&self, docs: Vec<Document>) -> Result<(), EngineError> {
        let mut data = self.data.write();
        for doc in docs {
            insert_locked(&mut data, doc)?;
        }
        Ok(())
    }

    /// Retrieve a document by id.
    pub fn get_document(&self, id: &str) -> Option<Arc<Document>> {
        self.data.read().documents.get(id).cloned()
    }

    /// Remove a document by id. Returns `true` if it existed.
    pub fn remove_document(&self, id: &str) -> bool {
        let mut data = self.data.write();
        remove_locked(&mut data, id)
    }

    /// Remove a batch of documents under one write lock. Returns how many
    /// existed and were removed; no reader observes a partial batch.
    pub fn remove_many(&self, ids: &[String]) -> usize {
        let mut data = self.data.write();
        ids.iter()
            .filter(|id| remove_locked(&mut data, id.as_str()))
            .count()
    }

    /// Live document count.
    pub fn count(&self) -> usize {
        self.data.read().documents.len()
    }

    /// Collection summary.
    pub fn info(&self) -> CollectionInfo {
        let data = self.data.read();
        CollectionInfo {
            name: data.name.clone(),
            dimension: data.dimension,
            metric: data.metric,
            index_type: data.index_type,
            count: data.documents.len(),
            created_at: data.created_at,
        }
    }

    /// Ids of documents whose TTL has elapsed at `now`.
    pub fn expired_ids(&self, now: i64) -> Vec<String> {
        self.data
            .read()
            .documents
            .values()
            .filter(|doc| doc.is_expired(now))
            .map(|doc| doc.id.clone())
            .collect()
    }

    /// Execute a query.
    ///
    /// HNSW path: over-fetch (`top_k × 10` under a filter, capped at the
    /// collection size), post-filter, hide expired documents, truncate.
    /// Flat path: filter first, score remaining, sort, truncate.
    pub fn query(&self, vector: &[f64], opts: &QueryOptions) -> Result<QueryResponse, EngineError> {
        let start = Instant::now();
        let data = self.data.read();

        if vector.len() != data.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: data.dimension,
                got: vector.len(),
            });
        }

        let now = ttl::now_ms();
        let total = data.documents.len();
        let top_k = opts.top_k;

        let use_hnsw =
            data.index_type == IndexType::Hnsw && !opts.force_flat && data.hnsw.is_some();

        let (hits, comparisons, method) = if use_hnsw {
            let hnsw = data.hnsw.as_ref().expect("hnsw present for hnsw route");
            let fetch_k = if opts.filter.is_some() {
                (top_k * config::FILTER_OVERFETCH_FACTOR).min(total)
            } else {
                top_k
            };
            let ef = opts
                .ef_search
                .unwrap_or(hnsw.config.ef_search)
                .max(fetch_k);

            let outcome = hnsw.search(vector, fetch_k, Some(ef));
            let mut hits = outcome.hits;
            if let Some(filter) = &opts.filter {
                hits.retain(|hit| filter.matches(&hit.document.metadata));
            }
            hits.retain(|hit| !hit.document.is_expired(now));
            hits.truncate(top_k);
            (hits, outcome.comparisons, QueryMethod::Hnsw)
        } else {
            let mut comparisons = 0u64;
            let mut hits: Vec<SearchHit> = data
                .documents
                .values()
                .filter(|doc| {
                    opts.filter
                        .as_ref()
                        .is_none_or(|filter| filter.matches(&doc.metadata))
                })
                .filter(|doc| !doc.is_expired(now))
                .map(|doc| {
                    comparisons += 1;
                    SearchHit {
                        score: data.metric.score(vector, &doc.vector),
                        document: Arc::clone(doc),
                    }
                })
                .collect();
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits.truncate(top_k);
            (hits, comparisons, QueryMethod::Flat)
        };

        data.stats.queries.fetch_add(1, Ordering::Relaxed);

        let results = hits
            .into_iter()
            .map(|hit| QueryResult {
                id: hit.document.id.clone(),
                score: hit.score,
                vector: opts.include_vectors.then(|| hit.document.vector.clone()),
                metadata: hit.document.metadata.clone(),
            })
            .collect();

        Ok(QueryResponse {
            results,
            elapsed_ms: start.elapsed().as_secs_f64() * 1_000.0,
            comparisons,
            total,
            method,
        })
    }
}

/// Insert under an already-held write lock.
fn insert_locked(data: &mut CollectionData, doc: Document) -> Result<(), EngineError> {
    if doc.vector.is_empty() {
        return Err(EngineError::InvalidVector("vector is empty".into()));
    }
    if doc.vector.iter().any(|x| !x.is_finite()) {
        return Err(EngineError::InvalidVector(
            "vector contains a non-finite component".into(),
        ));
    }
    if doc.vector.len() != data.dimension {
        return Err(EngineError::DimensionMismatch {
            expected: data.dimension,
            got: doc.vector.len(),
        });
    }

    if data.documents.contains_key(&doc.id) {
        if let Some(hnsw) = data.hnsw.as_mut() {
            hnsw.remove(&doc.id);
        }
        data.documents.remove(&doc.id);
    }

    let doc = Arc::new(doc);
    if let Some(hnsw) = data.hnsw.as_mut() {
        hnsw.insert(Arc::clone(&doc));
    }
    data.documents.insert(doc.id.clone(), doc);
    data.stats.inserts.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

/// Remove under an already-held write lock.
fn remove_locked(data: &mut CollectionData, id: &str) -> bool {
    if data.documents.remove(id).is_none() {
        return false;
    }
    if let Some(hnsw) = data.hnsw.as_mut() {
        hnsw.remove(id);
    }
    data.stats.deletes.fetch_add(1, Ordering::Relaxed);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::engine::QueryOptions;

    fn flat_collection() -> Collection {
        Collection::new(
            "test".into(),
            2,
            Metric::Cosine,
            IndexType::Flat,
            HnswConfig::default(),
        )
    }

    fn doc(id: &str, vector: Vec<f64>) -> Document {
        Document::new(id, vector, Metadata::new())
    }

    #[test]
    fn test_insert_and_count() {
        let collection = flat_collection();
        collection.insert_document(doc("a", vec![1.0, 0.0])).unwrap();
        collection.insert_document(doc("b", vec![0.0, 1.0])).unwrap();
        assert_eq!(collection.count(), 2);
        assert!(collection.get_document("a").is_some());
    }

    #[test]
    fn test_insert_rejects_wrong_dimension() {
        let collection = flat_collection();
        let err = collection
            .insert_document(doc("a", vec![1.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DimensionMismatch {
                expected: 2,
                got: 3
            }
        ));
    }

    #[test]
    fn test_insert_rejects_invalid_vector() {
        let collection = flat_collection();
        assert!(matches!(
            collection.insert_document(doc("a", vec![])),
            Err(EngineError::InvalidVector(_))
        ));
        assert!(matches!(
            collection.insert_document(doc("a", vec![f64::NAN, 0.0])),
            Err(EngineError::InvalidVector(_))
        ));
    }

    #[test]
    fn test_insert_replaces_existing_id() {
        let collection = Collection::new(
            "test".into(),
            2,
            Metric::Cosine,
            IndexType::Hnsw,
            HnswConfig::default(),
        );
        collection.insert_document(doc("a", vec![1.0, 0.0])).unwrap();
        collection.insert_document(doc("a", vec![0.0, 1.0])).unwrap();
        assert_eq!(collection.count(), 1);
        assert_eq!(
            collection.get_document("a").unwrap().vector,
            vec![0.0, 1.0]
        );
        // Graph stayed in step with the store
        let data = collection.data.read();
        assert_eq!(data.hnsw.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_document() {
        let collection = flat_collection();
        collection.insert_document(doc("a", vec![1.0, 0.0])).unwrap();
        assert!(collection.remove_document("a"));
        assert!(!collection.remove_document("a"));
        assert_eq!(collection.count(), 0);
    }

    #[test]
    fn test_flat_query_orders_by_score() {
        let collection = flat_collection();
        collection.insert_document(doc("x", vec![1.0, 0.0])).unwrap();
        collection.insert_document(doc("y", vec![0.0, 1.0])).unwrap();
        collection
            .insert_document(doc("close", vec![0.9, 0.1]))
            .unwrap();

        let response = collection
            .query(&[1.0, 0.0], &QueryOptions::default())
            .unwrap();
        assert_eq!(response.method, QueryMethod::Flat);
        assert_eq!(response.results[0].id, "x");
        assert_eq!(response.results[1].id, "close");
        assert_eq!(response.total, 3);
        assert_eq!(response.comparisons, 3);
    }

    #[test]
    fn test_query_rejects_wrong_dimension() {
        let collection = flat_collection();
        let err = collection
            .query(&[1.0, 0.0, 0.0], &QueryOptions::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_include_vectors_opt_out() {
        let collection = flat_collection();
        collection.insert_document(doc("a", vec![1.0, 0.0])).unwrap();
        let opts = QueryOptions {
            include_vectors: false,
            ..QueryOptions::default()
        };
        let response = collection.query(&[1.0, 0.0], &opts).unwrap();
        assert!(response.results[0].vector.is_none());
    }

    #[test]
    fn test_hnsw_collection_counts_match() {
        let collection = Collection::new(
            "test".into(),
            2,
            Metric::Cosine,
            IndexType::Hnsw,
            HnswConfig::default(),
        );
        for i in 0..20 {
            let angle = i as f64 * 0.3;
            collection
                .insert_document(doc(&format!("n{i}"), vec![angle.cos(), angle.sin()]))
                .unwrap();
        }
        collection.remove_document("n3");
        collection.remove_document("n9");

        let data = collection.data.read();
        assert_eq!(data.documents.len(), data.hnsw.as_ref().unwrap().len());
        assert_eq!(data.documents.len(), 18);
    }

    #[test]
    fn test_insert_many_holds_one_lock() {
        let collection = flat_collection();
        collection
            .insert_many(vec![
                doc("a", vec![1.0, 0.0]),
                doc("b", vec![0.0, 1.0]),
                doc("c", vec![0.5, 0.5]),
            ])
            .unwrap();
        assert_eq!(collection.count(), 3);

        // A bad document stops the batch; the valid prefix stays
        let err = collection
            .insert_many(vec![doc("d", vec![1.0, 1.0]), doc("e", vec![1.0])])
            .unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));
        assert_eq!(collection.count(), 4);
    }

    #[test]
    fn test_remove_many_counts_existing_only() {
        let collection = flat_collection();
        collection
            .insert_many(vec![doc("a", vec![1.0, 0.0]), doc("b", vec![0.0, 1.0])])
            .unwrap();
        let removed = collection.remove_many(&["a".into(), "ghost".into(), "b".into()]);
        assert_eq!(removed, 2);
        assert_eq!(collection.count(), 0);
    }

    #[test]
    fn test_batch_not_observed_partially() {
        use std::sync::atomic::AtomicBool;

        // A writer streams large batches while readers assert they only ever
        // see batch-aligned collection sizes.
        let collection = Collection::new(
            "test".into(),
            2,
            Metric::Cosine,
            IndexType::Flat,
            HnswConfig::default(),
        );
        let batch = 25usize;
        let rounds = 8usize;
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let collection = collection.clone();
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                for round in 0..rounds {
                    let docs = (0..batch)
                        .map(|i| doc(&format!("r{round}d{i}"), vec![i as f64, 1.0]))
                        .collect();
                    collection.insert_many(docs).unwrap();
                }
                done.store(true, Ordering::Release);
            })
        };

        let reader = {
            let collection = collection.clone();
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let count = collection.count();
                    assert_eq!(count % batch, 0, "observed a partially applied batch");
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(collection.count(), batch * rounds);
    }

    #[test]
    fn test_force_flat_on_hnsw_collection() {
        let collection = Collection::new(
            "test".into(),
            2,
            Metric::Cosine,
            IndexType::Hnsw,
            HnswConfig::default(),
        );
        collection.insert_document(doc("a", vec![1.0, 0.0])).unwrap();
        let opts = QueryOptions {
            force_flat: true,
            ..QueryOptions::default()
        };
        let response = collection.query(&[1.0, 0.0], &opts).unwrap();
        assert_eq!(response.method, QueryMethod::Flat);
        assert_eq!(response.results.len(), 1);
    }
}
