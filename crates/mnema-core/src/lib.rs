//! Core types and error definitions for the Mnema knowledge base.
//!
//! This crate provides the foundational types shared across all Mnema crates:
//! the unified error enum, the memory data model, and the search and review
//! request/response types.
//!
//! # Main types
//!
//! - [`MnemaError`] — Unified error enum for all Mnema subsystems.
//! - [`MnemaResult`] — Convenience alias for `Result<T, MnemaError>`.
//! - [`Memory`] — A stored knowledge item with content and metadata.
//! - [`SearchQuery`] / [`SearchResponse`] — The hybrid search contract.
//! - [`ReviewDifficulty`] / [`MemoryStrength`] — Spaced-repetition grading.

/// Memory item data model.
pub mod memory;
/// Review grading and strength classification types.
pub mod review;
/// Search query, result, and response types.
pub mod search;

pub use memory::{Memory, MemoryMetadata, MemoryModality, MemoryType};
pub use review::{MemoryStrength, ReviewDifficulty};
pub use search::{
    SearchMode, SearchQuery, SearchResponse, SearchResult, TemporalFilter,
};

/// Top-level error type for the Mnema knowledge base.
///
/// Each variant corresponds to a subsystem or failure class that can produce
/// errors.
#[derive(Debug, thiserror::Error)]
pub enum MnemaError {
    /// A request was rejected by validation before any I/O was performed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A memory id was required to exist but could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An error from the embedding provider on the critical path.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An error from the vector store backend.
    #[error("Store error: {0}")]
    Store(String),

    /// An error from an outbound HTTP request (embedding or reranker API).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`MnemaError`].
pub type MnemaResult<T> = Result<T, MnemaError>;
