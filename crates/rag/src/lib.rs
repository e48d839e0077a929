//! # engram-rag
//!
//! Retrieval-augmented generation layer over the engram engine: an embedder
//! contract, a recursive text chunker, an ingestion/retrieval pipeline, and
//! the agent memory facades (episodic, semantic, procedural).
//!
//! Embedding is the only suspending operation; everything else delegates to
//! the synchronous core.

/// Recursive text chunking with separator fallback and overlap.
pub mod chunker;
/// Embedder contract and the deterministic offline implementation.
pub mod embedder;
/// Error types for embedding and pipeline operations.
pub mod error;
/// Agent memory facades: preconfigured tenant-tagged collections.
pub mod memory;
/// Chunk → embed → insert pipeline and query-side retrieval.
pub mod pipeline;

pub use chunker::{chunk_text, Chunk, ChunkConfig};
pub use embedder::{Embedder, HashEmbedder};
pub use error::{EmbeddingError, RagError};
pub use memory::{MemoryKind, MemoryStore};
pub use pipeline::RagPipeline;
