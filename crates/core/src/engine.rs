//! Engine: collection lifecycle and operation orchestration.
//!
//! The [`Engine`] owns all collections, the audit log, and the optional TTL
//! sweeper task. It is a cloneable handle — clones share state — and every
//! top-level call is one lock-scoped critical section. Queries observe all
//! completed inserts and none that follow (read-your-writes).

use crate::audit::AuditLog;
use crate::collection::{Collection, CollectionInfo, IndexType, QueryResponse};
use crate::config;
use crate::document::{Document, Metadata, MetadataValue, TTL_DURATION_KEY, TTL_EXPIRES_KEY};
use crate::error::EngineError;
use crate::filter::Filter;
use crate::hnsw::HnswConfig;
use crate::tenant::Tenant;
use crate::ttl::{self, TtlSpec};
use crate::vector::Metric;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Options for [`Engine::create_collection`].
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    /// Vector dimension; every stored vector must have exactly this length.
    pub dimension: usize,
    /// Similarity metric.
    pub metric: Metric,
    /// Index backing the collection.
    pub index_type: IndexType,
    /// HNSW tuning; ignored for flat collections.
    pub hnsw_config: Option<HnswConfig>,
}

impl CollectionOptions {
    /// Options for an HNSW-indexed cosine collection of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            metric: Metric::Cosine,
            index_type: IndexType::Hnsw,
            hnsw_config: None,
        }
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    pub fn hnsw_config(mut self, config: HnswConfig) -> Self {
        self.hnsw_config = Some(config);
        self
    }
}

/// One document in an insert batch.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSpec {
    /// Explicit id; a monotonic-random id is minted when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Embedding vector.
    pub vector: Vec<f64>,
    /// Caller metadata.
    #[serde(default)]
    pub metadata: Option<Metadata>,
    /// Optional time-to-live.
    #[serde(default)]
    pub ttl: Option<TtlSpec>,
}

impl DocumentSpec {
    pub fn new(vector: Vec<f64>) -> Self {
        Self {
            id: None,
            vector,
            metadata: None,
            ttl: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn ttl(mut self, ttl: TtlSpec) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Options for [`Engine::query`].
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Maximum results returned. Default 10.
    pub top_k: usize,
    /// Metadata filter, post-applied on the HNSW path with over-fetch.
    pub filter: Option<Filter>,
    /// Route an HNSW collection through the brute-force path.
    pub force_flat: bool,
    /// Per-query override of the HNSW beam width.
    pub ef_search: Option<usize>,
    /// Include vectors in results. Default true.
    pub include_vectors: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            filter: None,
            force_flat: false,
            ef_search: None,
            include_vectors: true,
        }
    }
}

#[derive(Debug)]
struct EngineInner {
    collections: RwLock<HashMap<String, Collection>>,
    audit: AuditLog,
    id_seq: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// The engine: owns all collections and orchestrates every operation.
///
/// Cloning is cheap and produces a handle to the same shared state.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Creates an empty engine. The TTL sweeper is not started; call
    /// [`Engine::spawn_ttl_sweeper`] from within a tokio runtime to enable it.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineInner {
                collections: RwLock::new(HashMap::new()),
                audit: AuditLog::default(),
                id_seq: AtomicU64::new(0),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// The engine's audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    /// Create a collection.
    pub fn create_collection(
        &self,
        name: &str,
        opts: CollectionOptions,
    ) -> Result<CollectionInfo, EngineError> {
        if name.is_empty() {
            return Err(EngineError::InvalidArgument(
                "collection name must be non-empty".into(),
            ));
        }
        if name.len() > config::MAX_COLLECTION_NAME_LEN {
            return Err(EngineError::InvalidArgument(format!(
                "collection name exceeds {} characters",
                config::MAX_COLLECTION_NAME_LEN
            )));
        }
        if opts.dimension == 0 || opts.dimension > config::MAX_DIMENSION {
            return Err(EngineError::InvalidArgument(format!(
                "dimension must be in 1..={}",
                config::MAX_DIMENSION
            )));
        }

        let mut collections = self.inner.collections.write();
        if collections.contains_key(name) {
            return Err(EngineError::CollectionExists(name.to_string()));
        }
        let collection = Collection::new(
            name.to_string(),
            opts.dimension,
            opts.metric,
            opts.index_type,
            opts.hnsw_config.unwrap_or_default(),
        );
        let info = collection.info();
        collections.insert(name.to_string(), collection);
        drop(collections);

        self.inner
            .audit
            .record("create_collection", "engine", name, 0, None, None);
        Ok(info)
    }

    /// Drop a collection, releasing its graph and documents. Returns `true`
    /// if it existed.
    pub fn drop_collection(&self, name: &str) -> bool {
        let removed = self.inner.collections.write().remove(name).is_some();
        if removed {
            self.inner
                .audit
                .record("drop_collection", "engine", name, 0, None, None);
        }
        removed
    }

    /// Summaries of all collections.
    pub fn list_collections(&self) -> Vec<CollectionInfo> {
        self.inner
            .collections
            .read()
            .values()
            .map(Collection::info)
            .collect()
    }

    /// Summary of one collection, or `None`.
    pub fn get_collection(&self, name: &str) -> Option<CollectionInfo> {
        self.inner
            .collections
            .read()
            .get(name)
            .map(Collection::info)
    }

    /// Handle to a collection's shared state.
    pub(crate) fn collection(&self, name: &str) -> Result<Collection, EngineError> {
        self.inner
            .collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::CollectionNotFound(name.to_string()))
    }

    /// Insert a batch of documents, in order. Returns the assigned ids in
    /// the same order.
    ///
    /// An existing id is replaced (delete-then-insert). TTL and id
    /// validation happens before anything is stored; the storage itself runs
    /// under one collection write lock, so concurrent queries never observe
    /// a partially applied batch.
    pub fn insert(
        &self,
        name: &str,
        specs: Vec<DocumentSpec>,
    ) -> Result<Vec<String>, EngineError> {
        let start = Instant::now();
        let collection = self.collection(name)?;

        let mut ids = Vec::with_capacity(specs.len());
        let mut docs = Vec::with_capacity(specs.len());
        for spec in specs {
            let mut metadata = spec.metadata.unwrap_or_default();

            if let Some(ttl_spec) = &spec.ttl {
                let duration_ms = ttl::parse_ttl(ttl_spec)?;
                metadata.insert(
                    TTL_EXPIRES_KEY.to_string(),
                    MetadataValue::Int(ttl::now_ms() + duration_ms),
                );
                metadata.insert(
                    TTL_DURATION_KEY.to_string(),
                    MetadataValue::Str(ttl_spec.display_form()),
                );
            }

            let id = match spec.id {
                Some(id) if id.is_empty() => {
                    return Err(EngineError::InvalidArgument(
                        "document id must be non-empty".into(),
                    ))
                }
                Some(id) => id,
                None => self.mint_id(),
            };

            ids.push(id.clone());
            docs.push(Document::new(id, spec.vector, metadata));
        }

        collection.insert_many(docs)?;

        self.inner.audit.record(
            "insert",
            "engine",
            name,
            ids.len(),
            Some(start.elapsed().as_millis() as u64),
            None,
        );
        Ok(ids)
    }

    /// Delete documents by id. Returns how many existed and were removed.
    ///
    /// The whole batch is removed under one collection write lock.
    pub fn delete(&self, name: &str, ids: &[String]) -> Result<usize, EngineError> {
        let start = Instant::now();
        let collection = self.collection(name)?;
        let removed = collection.remove_many(ids);

        self.inner.audit.record(
            "delete",
            "engine",
            name,
            removed,
            Some(start.elapsed().as_millis() as u64),
            None,
        );
        Ok(removed)
    }

    /// Query a collection. See [`QueryOptions`] for the knobs.
    pub fn query(
        &self,
        name: &str,
        vector: &[f64],
        opts: &QueryOptions,
    ) -> Result<QueryResponse, EngineError> {
        let collection = self.collection(name)?;
        let response = collection.query(vector, opts)?;

        self.inner.audit.record(
            "query",
            "engine",
            name,
            response.results.len(),
            Some(response.elapsed_ms as u64),
            None,
        );
        Ok(response)
    }

    /// A tenant-scoped view over one collection.
    pub fn tenant(&self, collection: &str, tenant_id: &str) -> Tenant<'_> {
        Tenant::new(self, collection, tenant_id)
    }

    /// One synchronous TTL sweep over every collection.
    ///
    /// Expired documents are deleted through the normal delete path, and a
    /// `ttl_sweep` audit record is emitted per collection with expirations.
    /// A failing collection is logged and skipped; it never prevents
    /// sweeping the others. Returns the number of documents removed.
    pub fn sweep_expired(&self) -> usize {
        let now = ttl::now_ms();
        let collections: Vec<(String, Collection)> = self
            .inner
            .collections
            .read()
            .iter()
            .map(|(name, collection)| (name.clone(), collection.clone()))
            .collect();

        let mut total = 0;
        for (name, collection) in collections {
            let expired = collection.expired_ids(now);
            if expired.is_empty() {
                continue;
            }
            match self.delete(&name, &expired) {
                Ok(removed) => {
                    total += removed;
                    self.inner
                        .audit
                        .record("ttl_sweep", "engine", &name, removed, None, None);
                }
                Err(err) => {
                    tracing::warn!(collection = %name, error = %err, "TTL sweep failed, continuing");
                }
            }
        }
        total
    }

    /// Spawn the periodic TTL sweeper onto the current tokio runtime.
    ///
    /// Replaces (and cancels) any previously spawned sweeper.
    pub fn spawn_ttl_sweeper(&self, interval: Duration) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let removed = engine.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "TTL sweep removed expired documents");
                }
            }
        });
        if let Some(previous) = self.inner.sweeper.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the TTL sweeper. Idempotent; safe to call without a sweeper.
    pub fn close(&self) {
        if let Some(handle) = self.inner.sweeper.lock().take() {
            handle.abort();
        }
    }

    /// Mint a monotonic-random document id: a hex sequence number for insert
    /// ordering plus a random suffix for unguessability.
    fn mint_id(&self) -> String {
        let seq = self.inner.id_seq.fetch_add(1, Ordering::Relaxed);
        let random = uuid::Uuid::new_v4().simple().to_string();
        format!("{seq:08x}-{}", &random[..12])
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(name: &str, index_type: IndexType) -> Engine {
        let engine = Engine::new();
        engine
            .create_collection(
                name,
                CollectionOptions::new(2).index_type(index_type),
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_create_and_list_collections() {
        let engine = Engine::new();
        let info = engine
            .create_collection("docs", CollectionOptions::new(8))
            .unwrap();
        assert_eq!(info.name, "docs");
        assert_eq!(info.dimension, 8);
        assert_eq!(info.count, 0);

        assert_eq!(engine.list_collections().len(), 1);
        assert!(engine.get_collection("docs").is_some());
        assert!(engine.get_collection("nope").is_none());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let engine = engine_with("docs", IndexType::Flat);
        let err = engine
            .create_collection("docs", CollectionOptions::new(2))
            .unwrap_err();
        assert!(matches!(err, EngineError::CollectionExists(_)));
    }

    #[test]
    fn test_create_rejects_bad_arguments() {
        let engine = Engine::new();
        assert!(matches!(
            engine.create_collection("", CollectionOptions::new(2)),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.create_collection("docs", CollectionOptions::new(0)),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_drop_collection() {
        let engine = engine_with("docs", IndexType::Flat);
        assert!(engine.drop_collection("docs"));
        assert!(!engine.drop_collection("docs"));
        assert!(engine.get_collection("docs").is_none());
    }

    #[test]
    fn test_insert_mints_ids_in_order() {
        let engine = engine_with("docs", IndexType::Flat);
        let ids = engine
            .insert(
                "docs",
                vec![
                    DocumentSpec::new(vec![1.0, 0.0]),
                    DocumentSpec::new(vec![0.0, 1.0]),
                    DocumentSpec::new(vec![0.5, 0.5]),
                ],
            )
            .unwrap();
        assert_eq!(ids.len(), 3);
        // Minted ids are monotonic by insert order
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
        assert_eq!(engine.get_collection("docs").unwrap().count, 3);
    }

    #[test]
    fn test_insert_unknown_collection() {
        let engine = Engine::new();
        assert!(matches!(
            engine.insert("nope", vec![DocumentSpec::new(vec![1.0])]),
            Err(EngineError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_insert_rejects_empty_id() {
        let engine = engine_with("docs", IndexType::Flat);
        assert!(matches!(
            engine.insert("docs", vec![DocumentSpec::new(vec![1.0, 0.0]).id("")]),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_insert_rejects_bad_ttl() {
        let engine = engine_with("docs", IndexType::Flat);
        let err = engine
            .insert(
                "docs",
                vec![DocumentSpec::new(vec![1.0, 0.0]).ttl(TtlSpec::Text("soon".into()))],
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTtl(_)));
    }

    #[test]
    fn test_insert_ttl_installs_reserved_keys() {
        let engine = engine_with("docs", IndexType::Flat);
        let ids = engine
            .insert(
                "docs",
                vec![DocumentSpec::new(vec![1.0, 0.0])
                    .id("d")
                    .ttl(TtlSpec::Text("5m".into()))],
            )
            .unwrap();
        let doc = engine.collection("docs").unwrap().get_document(&ids[0]).unwrap();
        let expires = doc.ttl_expires().unwrap();
        assert!(expires > ttl::now_ms());
        assert_eq!(
            doc.metadata.get(TTL_DURATION_KEY),
            Some(&MetadataValue::Str("5m".into()))
        );
    }

    #[test]
    fn test_delete_counts_existing_only() {
        let engine = engine_with("docs", IndexType::Flat);
        engine
            .insert("docs", vec![DocumentSpec::new(vec![1.0, 0.0]).id("a")])
            .unwrap();
        let removed = engine
            .delete("docs", &["a".into(), "ghost".into()])
            .unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_query_unknown_collection() {
        let engine = Engine::new();
        assert!(matches!(
            engine.query("nope", &[1.0], &QueryOptions::default()),
            Err(EngineError::CollectionNotFound(_))
        ));
    }

    #[test]
    fn test_query_hides_expired_documents() {
        let engine = engine_with("docs", IndexType::Flat);
        let mut expired = Metadata::new();
        expired.insert(TTL_EXPIRES_KEY.into(), MetadataValue::Int(1));
        engine
            .insert(
                "docs",
                vec![
                    DocumentSpec::new(vec![1.0, 0.0]).id("dead").metadata(expired),
                    DocumentSpec::new(vec![1.0, 0.0]).id("alive"),
                ],
            )
            .unwrap();

        let response = engine
            .query("docs", &[1.0, 0.0], &QueryOptions::default())
            .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].id, "alive");
        // Hidden, but still physically present until a sweep
        assert_eq!(response.total, 2);
    }

    #[test]
    fn test_sweep_expired_removes_and_audits() {
        let engine = engine_with("docs", IndexType::Flat);
        let mut expired = Metadata::new();
        expired.insert(TTL_EXPIRES_KEY.into(), MetadataValue::Int(1));
        engine
            .insert(
                "docs",
                vec![
                    DocumentSpec::new(vec![1.0, 0.0]).id("dead").metadata(expired),
                    DocumentSpec::new(vec![0.0, 1.0]).id("alive"),
                ],
            )
            .unwrap();

        let removed = engine.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(engine.get_collection("docs").unwrap().count, 1);

        let sweeps = engine.audit().query(&crate::audit::AuditQuery {
            action: Some("ttl_sweep".into()),
            ..Default::default()
        });
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].document_count, 1);
    }

    #[test]
    fn test_audit_records_lifecycle_actions() {
        let engine = engine_with("docs", IndexType::Flat);
        engine
            .insert("docs", vec![DocumentSpec::new(vec![1.0, 0.0]).id("a")])
            .unwrap();
        engine.query("docs", &[1.0, 0.0], &QueryOptions::default()).unwrap();
        engine.delete("docs", &["a".into()]).unwrap();
        engine.drop_collection("docs");

        let stats = engine.audit().stats();
        for action in ["create_collection", "insert", "query", "delete", "drop_collection"] {
            assert_eq!(stats.by_action[action], 1, "missing audit for {action}");
        }
    }

    #[test]
    fn test_update_is_delete_then_insert() {
        let engine = engine_with("docs", IndexType::Flat);
        engine
            .insert("docs", vec![DocumentSpec::new(vec![1.0, 0.0]).id("a")])
            .unwrap();
        engine
            .insert("docs", vec![DocumentSpec::new(vec![0.0, 1.0]).id("a")])
            .unwrap();
        assert_eq!(engine.get_collection("docs").unwrap().count, 1);
        let doc = engine.collection("docs").unwrap().get_document("a").unwrap();
        assert_eq!(doc.vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_close_without_sweeper_is_noop() {
        let engine = Engine::new();
        engine.close();
        engine.close();
    }
}
