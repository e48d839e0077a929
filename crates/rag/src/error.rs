//! Error types for the RAG layer.

use engram_core::EngineError;
use thiserror::Error;

/// Errors that can occur while producing embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The embedding provider failed or returned an unusable response.
    #[error("embedding provider error: {0}")]
    Provider(String),

    /// The provider returned vectors of an unexpected length.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The provider returned a different number of vectors than texts.
    #[error("embedding count mismatch: sent {sent} texts, received {received} vectors")]
    CountMismatch { sent: usize, received: usize },
}

/// Top-level error type for pipeline and memory operations.
#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
