//! Agent memory facades.
//!
//! Episodic, semantic, and procedural memory are preconfigured collections
//! with tenant-tagged access: each [`MemoryStore`] is scoped to one agent,
//! and all reads and writes go through the engine's tenant wrapper, so
//! agents sharing a memory kind never see each other's entries.

use crate::embedder::Embedder;
use crate::error::{EmbeddingError, RagError};
use engram_core::engine::{CollectionOptions, DocumentSpec, Engine, QueryOptions};
use engram_core::{Metadata, MetadataValue, QueryResponse};
use std::sync::Arc;

/// The three agent memory kinds, each backed by its own collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// What happened: events, observations, conversations.
    Episodic,
    /// What is known: facts, entities, relationships.
    Semantic,
    /// How to do things: skills, procedures, strategies.
    Procedural,
}

impl MemoryKind {
    /// Name of the backing collection.
    pub fn collection_name(&self) -> &'static str {
        match self {
            MemoryKind::Episodic => "memory_episodic",
            MemoryKind::Semantic => "memory_semantic",
            MemoryKind::Procedural => "memory_procedural",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Episodic => "episodic",
            MemoryKind::Semantic => "semantic",
            MemoryKind::Procedural => "procedural",
        }
    }
}

/// Agent-scoped handle to one memory collection.
pub struct MemoryStore {
    engine: Engine,
    embedder: Arc<dyn Embedder>,
    kind: MemoryKind,
    agent_id: String,
}

impl MemoryStore {
    /// Open (creating if needed) the memory collection for `kind`, scoped to
    /// `agent_id`.
    pub fn new(
        engine: Engine,
        embedder: Arc<dyn Embedder>,
        kind: MemoryKind,
        agent_id: impl Into<String>,
    ) -> Result<Self, RagError> {
        let name = kind.collection_name();
        if engine.get_collection(name).is_none() {
            engine.create_collection(name, CollectionOptions::new(embedder.dimension()))?;
        }
        Ok(Self {
            engine,
            embedder,
            kind,
            agent_id: agent_id.into(),
        })
    }

    /// Store a memory. Returns the assigned document id.
    pub async fn remember(&self, text: &str, mut metadata: Metadata) -> Result<String, RagError> {
        let vector = self.embed_one(text).await?;
        metadata.insert("text".into(), MetadataValue::Str(text.to_string()));
        metadata.insert(
            "memory_kind".into(),
            MetadataValue::Str(self.kind.as_str().to_string()),
        );

        let ids = self
            .engine
            .tenant(self.kind.collection_name(), &self.agent_id)
            .insert(vec![DocumentSpec::new(vector).metadata(metadata)])?;
        let id = ids
            .into_iter()
            .next()
            .expect("one spec yields one id");

        self.engine.audit().record(
            "memory_store",
            &self.agent_id,
            self.kind.collection_name(),
            1,
            None,
            None,
        );
        Ok(id)
    }

    /// Retrieve the `top_k` memories most similar to `query`.
    pub async fn recall(&self, query: &str, top_k: usize) -> Result<QueryResponse, RagError> {
        let vector = self.embed_one(query).await?;
        let opts = QueryOptions {
            top_k,
            ..QueryOptions::default()
        };
        let response = self
            .engine
            .tenant(self.kind.collection_name(), &self.agent_id)
            .query(&vector, &opts)?;

        self.engine.audit().record(
            "memory_recall",
            &self.agent_id,
            self.kind.collection_name(),
            response.results.len(),
            None,
            None,
        );
        Ok(response)
    }

    /// Delete memories by id. Foreign or unknown ids are skipped; returns
    /// how many were removed.
    pub fn forget(&self, ids: &[String]) -> Result<usize, RagError> {
        let removed = self
            .engine
            .tenant(self.kind.collection_name(), &self.agent_id)
            .delete(ids)?;
        Ok(removed)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f64>, RagError> {
        let mut embeddings = self.embedder.embed(&[text.to_string()]).await?;
        if embeddings.is_empty() {
            return Err(EmbeddingError::CountMismatch {
                sent: 1,
                received: 0,
            }
            .into());
        }
        Ok(embeddings.swap_remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;

    fn store(engine: &Engine, agent: &str) -> MemoryStore {
        MemoryStore::new(
            engine.clone(),
            Arc::new(HashEmbedder::new(24)),
            MemoryKind::Episodic,
            agent,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_remember_and_recall() {
        let engine = Engine::new();
        let memory = store(&engine, "agent-1");
        memory
            .remember("met a friendly dog in the park", Metadata::new())
            .await
            .unwrap();
        memory
            .remember("wrote a parser for the config format", Metadata::new())
            .await
            .unwrap();

        let recalled = memory
            .recall("met a friendly dog in the park", 1)
            .await
            .unwrap();
        assert_eq!(recalled.results.len(), 1);
        assert_eq!(
            recalled.results[0].metadata.get("text"),
            Some(&MetadataValue::Str("met a friendly dog in the park".into()))
        );
    }

    #[tokio::test]
    async fn test_agents_are_isolated() {
        let engine = Engine::new();
        let first = store(&engine, "agent-1");
        let second = store(&engine, "agent-2");

        let id = first.remember("a private thought", Metadata::new()).await.unwrap();
        second.remember("a different thought", Metadata::new()).await.unwrap();

        let recalled = second.recall("a private thought", 10).await.unwrap();
        assert_eq!(recalled.results.len(), 1);
        assert_ne!(recalled.results[0].id, id);

        // Another agent cannot forget this agent's memories
        assert_eq!(second.forget(&[id.clone()]).unwrap(), 0);
        assert_eq!(first.forget(&[id]).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_kinds_use_separate_collections() {
        let engine = Engine::new();
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(24));
        for kind in [MemoryKind::Episodic, MemoryKind::Semantic, MemoryKind::Procedural] {
            MemoryStore::new(engine.clone(), Arc::clone(&embedder), kind, "agent").unwrap();
        }
        let mut names: Vec<String> = engine
            .list_collections()
            .into_iter()
            .map(|info| info.name)
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["memory_episodic", "memory_procedural", "memory_semantic"]
        );
    }

    #[tokio::test]
    async fn test_memory_actions_audited() {
        let engine = Engine::new();
        let memory = store(&engine, "agent-1");
        memory.remember("note", Metadata::new()).await.unwrap();
        memory.recall("note", 5).await.unwrap();

        let stats = engine.audit().stats();
        assert_eq!(stats.by_action["memory_store"], 1);
        assert_eq!(stats.by_action["memory_recall"], 1);
        assert!(stats.by_actor["agent-1"] >= 2);
    }
}
