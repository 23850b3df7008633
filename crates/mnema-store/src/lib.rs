//! Hybrid dense + sparse vector storage for Mnema.
//!
//! Defines the vector store contract consumed by the search and ingestion
//! pipelines, with an in-memory brute-force backend and a JSONL file-backed
//! backend that survives restarts.
//!
//! # Main types
//!
//! - [`VectorStore`] — Trait for upserting and querying hybrid vectors.
//! - [`VectorQuery`] — A dense / sparse / fused retrieval request.
//! - [`MemoryFilter`] — Structural payload filter (AND across fields).
//! - [`InMemoryVectorStore`] — Brute-force in-process backend.
//! - [`FileVectorStore`] — JSONL-persisted backend.

/// Structural filtering over memory payloads.
pub mod filter;
/// Vector store trait and backends.
pub mod store;

pub use filter::MemoryFilter;
pub use store::{
    FileVectorStore, InMemoryVectorStore, ScoredMemory, VectorQuery, VectorStore,
};
