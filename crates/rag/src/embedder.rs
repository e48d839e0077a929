//! Embedder contract.
//!
//! The core never inspects an embedder beyond its declared dimension,
//! provider name, and the `embed` call itself. [`HashEmbedder`] is a
//! deterministic offline implementation for tests and air-gapped use —
//! stable, content-derived unit vectors with no model behind them.

use crate::error::EmbeddingError;
use async_trait::async_trait;
use engram_core::vector;
use sha2::{Digest, Sha256};

/// A source of text embeddings.
///
/// Implementations must be thread-safe; embedding is the only suspending
/// operation in the RAG layer.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of the vectors this embedder produces.
    fn dimension(&self) -> usize;

    /// Provider name, e.g. `"openai"`, `"ollama"`, `"hash"`.
    fn provider(&self) -> &str;

    /// Embed a batch of texts, one vector per text, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError>;
}

/// Deterministic, offline embedder.
///
/// Derives each vector from SHA-256 digests of the text, so identical
/// inputs always embed identically and similar-but-different inputs land
/// far apart. Useful for tests and environments without a model provider;
/// it carries no semantic signal.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.dimension);
        let mut block: u64 = 0;
        while values.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(b"engram-hash-embedder");
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest {
                if values.len() == self.dimension {
                    break;
                }
                values.push(byte as f64 / 127.5 - 1.0);
            }
            block += 1;
        }
        vector::normalize(&values)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider(&self) -> &str {
        "hash"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
