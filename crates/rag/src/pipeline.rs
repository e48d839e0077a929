//! Ingestion and retrieval pipeline: chunk → embed → insert, query → embed → search.

use crate::chunker::{chunk_text, ChunkConfig};
use crate::embedder::Embedder;
use crate::error::{EmbeddingError, RagError};
use engram_core::engine::{CollectionOptions, DocumentSpec, Engine, QueryOptions};
use engram_core::{Metadata, MetadataValue, QueryResponse};
use std::sync::Arc;
use std::time::Instant;

/// Orchestrates chunking, embedding, and storage for one collection.
///
/// The target collection is created on construction at the embedder's
/// declared dimension. If the embedder's first actual output has a different
/// length and the collection is still empty, it is dropped and re-created at
/// the observed dimension — providers occasionally misreport until the first
/// real call.
pub struct RagPipeline {
    engine: Engine,
    embedder: Arc<dyn Embedder>,
    collection: String,
    chunk_config: ChunkConfig,
}

impl RagPipeline {
    /// Create a pipeline over `collection`, creating the collection if needed.
    pub fn new(
        engine: Engine,
        embedder: Arc<dyn Embedder>,
        collection: impl Into<String>,
    ) -> Result<Self, RagError> {
        let collection = collection.into();
        if engine.get_collection(&collection).is_none() {
            engine.create_collection(&collection, CollectionOptions::new(embedder.dimension()))?;
        }
        Ok(Self {
            engine,
            embedder,
            collection,
            chunk_config: ChunkConfig::default(),
        })
    }

    /// Replace the chunking configuration.
    pub fn chunk_config(mut self, config: ChunkConfig) -> Self {
        self.chunk_config = config;
        self
    }

    /// Chunk `text`, embed every chunk, and insert the results.
    ///
    /// Each chunk becomes a document with id `{source}::{chunk_index}`; the
    /// chunk text and provenance are stored in metadata alongside the
    /// caller's `base_metadata`. Returns the inserted document ids, in chunk
    /// order.
    pub async fn ingest(
        &self,
        source: &str,
        text: &str,
        base_metadata: Metadata,
    ) -> Result<Vec<String>, RagError> {
        let start = Instant::now();
        let chunks = chunk_text(text, &self.chunk_config);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: chunks.len(),
                received: embeddings.len(),
            }
            .into());
        }
        if let Some(first) = embeddings.first() {
            self.reconcile_dimension(first.len())?;
        }

        let specs: Vec<DocumentSpec> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                let mut metadata = base_metadata.clone();
                metadata.insert("source".into(), MetadataValue::Str(source.to_string()));
                metadata.insert("text".into(), MetadataValue::Str(chunk.text.clone()));
                metadata.insert("chunk_index".into(), MetadataValue::Int(chunk.index as i64));
                metadata.insert(
                    "char_start".into(),
                    MetadataValue::Int(chunk.char_start as i64),
                );
                metadata.insert("char_end".into(), MetadataValue::Int(chunk.char_end as i64));
                DocumentSpec::new(vector)
                    .id(format!("{source}::{}", chunk.index))
                    .metadata(metadata)
            })
            .collect();

        let ids = self.engine.insert(&self.collection, specs)?;
        self.engine.audit().record(
            "rag_ingest",
            "rag",
            &self.collection,
            ids.len(),
            Some(start.elapsed().as_millis() as u64),
            Some(format!("source={source}")),
        );
        tracing::debug!(source, chunks = ids.len(), "ingested document");
        Ok(ids)
    }

    /// Embed `query` and search the collection.
    pub async fn retrieve(
        &self,
        query: &str,
        opts: &QueryOptions,
    ) -> Result<QueryResponse, RagError> {
        let start = Instant::now();
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let vector = if embeddings.is_empty() {
            return Err(EmbeddingError::CountMismatch {
                sent: 1,
                received: 0,
            }
            .into());
        } else {
            embeddings.swap_remove(0)
        };

        let response = self.engine.query(&self.collection, &vector, opts)?;
        self.engine.audit().record(
            "rag_retrieve",
            "rag",
            &self.collection,
            response.results.len(),
            Some(start.elapsed().as_millis() as u64),
            None,
        );
        Ok(response)
    }

    /// Align the collection dimension with the embedder's observed output.
    ///
    /// Only an empty collection is re-created; once documents exist the
    /// normal `DimensionMismatch` error surfaces instead.
    fn reconcile_dimension(&self, observed: usize) -> Result<(), RagError> {
        let Some(info) = self.engine.get_collection(&self.collection) else {
            self.engine
                .create_collection(&self.collection, CollectionOptions::new(observed))?;
            return Ok(());
        };
        if info.dimension != observed && info.count == 0 {
            tracing::warn!(
                collection = %self.collection,
                declared = info.dimension,
                observed,
                "embedder output differs from declared dimension, re-creating collection"
            );
            self.engine.drop_collection(&self.collection);
            self.engine
                .create_collection(&self.collection, CollectionOptions::new(observed))?;
        }
        Ok(())
    }
}
