use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::{Memory, MemoryModality, MemoryType};
use crate::{MnemaError, MnemaResult};

/// Which retrieval paths a search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Dense and sparse retrieval fused by reciprocal rank.
    Hybrid,
    /// Semantic (dense vector) retrieval only.
    Dense,
    /// Keyword (sparse BM25-style) retrieval only.
    Sparse,
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Hybrid
    }
}

/// Preset time windows for filtering by creation date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalFilter {
    /// No time restriction.
    All,
    /// Start of the current day to now.
    Today,
    /// Trailing 7 days.
    Week,
    /// Trailing 30 days.
    Month,
    /// Trailing 90 days.
    Quarter,
    /// Trailing 365 days.
    Year,
    /// Caller-supplied `date_from` / `date_to`.
    Custom,
}

impl Default for TemporalFilter {
    fn default() -> Self {
        Self::All
    }
}

/// A hybrid search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query.
    pub query: String,
    /// Retrieval mode.
    #[serde(default)]
    pub mode: SearchMode,
    /// Maximum number of results, 1..=100.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Pagination offset.
    #[serde(default)]
    pub offset: usize,

    /// Restrict to these memory types (any-of).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_types: Option<Vec<MemoryType>>,
    /// Restrict to these modalities (any-of).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<MemoryModality>>,
    /// Restrict to these authors (any-of).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    /// Restrict to these projects (any-of).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    /// Restrict to these tags (any-of).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Preset creation-date window.
    #[serde(default)]
    pub temporal_filter: TemporalFilter,
    /// Custom window start, used with [`TemporalFilter::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    /// Custom window end, used with [`TemporalFilter::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,

    /// Whether to boost recent results with exponential decay.
    #[serde(default = "default_true")]
    pub temporal_boost: bool,
    /// Decay rate for the temporal boost, 0.0..=1.0.
    #[serde(default = "default_decay")]
    pub temporal_decay: f32,

    /// Whether to rerank candidates with a cross-encoder.
    #[serde(default = "default_true")]
    pub rerank: bool,
    /// Candidate pool size when reranking; must be at least `limit`.
    #[serde(default = "default_rerank_top_k")]
    pub rerank_top_k: usize,
}

fn default_limit() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_decay() -> f32 {
    0.1
}
fn default_rerank_top_k() -> usize {
    50
}

impl SearchQuery {
    /// Creates a query with defaults for everything but the text.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::Hybrid,
            limit: default_limit(),
            offset: 0,
            memory_types: None,
            modalities: None,
            authors: None,
            projects: None,
            tags: None,
            temporal_filter: TemporalFilter::All,
            date_from: None,
            date_to: None,
            temporal_boost: default_true(),
            temporal_decay: default_decay(),
            rerank: default_true(),
            rerank_top_k: default_rerank_top_k(),
        }
    }

    /// Sets the result limit, widening the rerank pool to cover it.
    /// Chainable.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self.rerank_top_k = self.rerank_top_k.max(limit);
        self
    }

    /// Sets the retrieval mode. Chainable.
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enables or disables cross-encoder reranking. Chainable.
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    /// Enables or disables the temporal boost. Chainable.
    pub fn with_temporal_boost(mut self, boost: bool) -> Self {
        self.temporal_boost = boost;
        self
    }

    /// Validates the query before any I/O is performed.
    ///
    /// Rejects empty query text, a limit outside `1..=100`, and a rerank
    /// candidate pool smaller than the limit.
    pub fn validate(&self) -> MnemaResult<()> {
        if self.query.trim().is_empty() {
            return Err(MnemaError::InvalidInput("query must not be empty".into()));
        }
        if self.limit == 0 || self.limit > 100 {
            return Err(MnemaError::InvalidInput(format!(
                "limit must be in 1..=100, got {}",
                self.limit
            )));
        }
        if self.rerank && self.rerank_top_k < self.limit {
            return Err(MnemaError::InvalidInput(format!(
                "rerank_top_k ({}) must be >= limit ({})",
                self.rerank_top_k, self.limit
            )));
        }
        Ok(())
    }
}

/// A single ranked search hit. Produced per query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched memory.
    pub memory: Memory,
    /// Fused relevance score.
    pub score: f32,
    /// Dense sub-score, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_score: Option<f32>,
    /// Sparse sub-score, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparse_score: Option<f32>,
    /// Up to three highlighted snippets, each at most 200 characters.
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// The response envelope for `search` and `find_similar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Whether the request succeeded.
    pub success: bool,
    /// The query text that was searched.
    pub query: String,
    /// The mode the search ran in.
    pub mode: SearchMode,
    /// Ranked results.
    pub results: Vec<SearchResult>,
    /// Number of results returned.
    pub total: usize,
    /// Wall-clock time for the whole operation, in milliseconds.
    pub took_ms: f64,
    /// Explanatory message on failure or degradation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_defaults() {
        assert!(SearchQuery::new("rust").validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_query() {
        assert!(SearchQuery::new("   ").validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_limit() {
        assert!(SearchQuery::new("q").with_limit(0).validate().is_err());
        assert!(SearchQuery::new("q").with_limit(101).validate().is_err());
        assert!(SearchQuery::new("q").with_limit(100).validate().is_ok());
    }

    #[test]
    fn with_limit_widens_rerank_pool() {
        let q = SearchQuery::new("q").with_limit(100);
        assert_eq!(q.rerank_top_k, 100);

        // A smaller limit leaves the default pool alone.
        let q = SearchQuery::new("q").with_limit(10);
        assert_eq!(q.rerank_top_k, 50);
    }

    #[test]
    fn validate_rejects_small_rerank_pool() {
        let mut q = SearchQuery::new("q").with_limit(60);
        q.rerank_top_k = 50;
        assert!(q.validate().is_err());

        // Pool check only applies when reranking is requested.
        q.rerank = false;
        assert!(q.validate().is_ok());
    }

    #[test]
    fn mode_serializes_lowercase() {
        let json = serde_json::to_string(&SearchMode::Hybrid).unwrap();
        assert_eq!(json, "\"hybrid\"");
    }
}
