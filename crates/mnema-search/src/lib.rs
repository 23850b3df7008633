//! Hybrid search pipeline.
//!
//! [`SearchEngine`] orchestrates the full retrieval flow: query embedding,
//! temporal window resolution, candidate retrieval, recency decay,
//! cross-encoder reranking, and highlight extraction. Retrieval itself is
//! delegated to a [`mnema_store::VectorStore`]; this crate owns everything
//! that happens before and after the store call.

pub mod engine;
pub mod highlight;
pub mod rerank;
pub mod temporal;

pub use engine::{SearchEngine, SearchEngineConfig};
pub use rerank::{CrossEncoder, TermOverlapCrossEncoder};
