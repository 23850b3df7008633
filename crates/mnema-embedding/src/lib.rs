//! Dense and sparse text vectorization for Mnema.
//!
//! Provides the embedding provider trait with local, remote, and fallback
//! implementations, plus the deterministic BM25-style sparse vectorizer used
//! on both the ingestion and query paths.
//!
//! # Main types
//!
//! - [`EmbeddingProvider`] — Trait for turning text into dense vectors.
//! - [`HashingEmbedding`] — Local deterministic hashed bag-of-words encoder.
//! - [`HttpEmbedding`] — Remote OpenAI-compatible embeddings backend.
//! - [`FallbackEmbedding`] — Primary provider with per-item fallback.
//! - [`SparseEncoder`] / [`SparseVector`] — BM25-style sparse vectorization.

/// Primary/secondary provider combinator.
pub mod fallback;
/// Embedding provider trait and local hashed encoder.
pub mod provider;
/// Remote HTTP embedding backend.
pub mod remote;
/// BM25-style sparse vectorization.
pub mod sparse;

pub use fallback::FallbackEmbedding;
pub use provider::{cosine_similarity, EmbeddingProvider, HashingEmbedding};
pub use remote::{HttpEmbedding, HttpEmbeddingConfig};
pub use sparse::{SparseConfig, SparseEncoder, SparseVector};
