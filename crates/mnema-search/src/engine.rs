//! The search pipeline orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use mnema_core::{
    MnemaResult, SearchMode, SearchQuery, SearchResponse, SearchResult,
};
use mnema_embedding::{EmbeddingProvider, SparseEncoder, SparseVector};
use mnema_store::{MemoryFilter, ScoredMemory, VectorQuery, VectorStore};

use crate::highlight::extract_highlights;
use crate::rerank::{blend, truncate_passage, CrossEncoder};
use crate::temporal::{decay_multiplier, resolve_window};

/// Tunables for [`SearchEngine`].
#[derive(Debug, Clone)]
pub struct SearchEngineConfig {
    /// Upper bound on a single cross-encoder call. The pipeline degrades
    /// to retrieval order when exceeded.
    pub rerank_timeout: Duration,
}

impl Default for SearchEngineConfig {
    fn default() -> Self {
        Self {
            rerank_timeout: Duration::from_secs(5),
        }
    }
}

/// Orchestrates the hybrid search pipeline over a vector store.
pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    sparse_encoder: SparseEncoder,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    config: SearchEngineConfig,
}

impl SearchEngine {
    /// Creates an engine without a cross-encoder; reranking requests
    /// degrade to retrieval order until one is attached.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            sparse_encoder: SparseEncoder::default(),
            cross_encoder: None,
            config: SearchEngineConfig::default(),
        }
    }

    /// Attaches a cross-encoder for reranking. Chainable.
    pub fn with_cross_encoder(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(encoder);
        self
    }

    /// Overrides the engine tunables. Chainable.
    pub fn with_config(mut self, config: SearchEngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the full search pipeline for a query.
    pub async fn search(&self, query: SearchQuery) -> MnemaResult<SearchResponse> {
        query.validate()?;
        let start = Instant::now();
        let now = Utc::now();

        // Embed the query per mode. An all-stopword query has no sparse
        // representation; in sparse mode that means no possible match,
        // in hybrid mode the dense side still carries the search.
        let dense = match query.mode {
            SearchMode::Hybrid | SearchMode::Dense => {
                Some(self.embedder.embed_query(&query.query).await?)
            }
            SearchMode::Sparse => None,
        };
        let sparse: Option<SparseVector> = match query.mode {
            SearchMode::Hybrid | SearchMode::Sparse => {
                let encoded = self.sparse_encoder.encode(&query.query);
                (!encoded.is_empty()).then_some(encoded)
            }
            SearchMode::Dense => None,
        };
        if dense.is_none() && sparse.is_none() {
            return Ok(SearchResponse {
                success: true,
                query: query.query,
                mode: query.mode,
                results: Vec::new(),
                total: 0,
                took_ms: start.elapsed().as_secs_f64() * 1000.0,
                message: Some("query contains no indexable terms".to_string()),
            });
        }

        let (date_from, date_to) = resolve_window(&query, now);
        let filter = MemoryFilter {
            memory_types: query.memory_types.clone(),
            modalities: query.modalities.clone(),
            authors: query.authors.clone(),
            projects: query.projects.clone(),
            tags: query.tags.clone(),
            date_from,
            date_to,
        };
        let filter = (!filter.is_empty()).then_some(filter);

        let rerank_active = query.rerank && self.cross_encoder.is_some();
        let page_end = query.offset + query.limit;
        let pool = if rerank_active {
            query.rerank_top_k.max(page_end)
        } else {
            page_end
        };

        let mut candidates = self
            .store
            .query(VectorQuery {
                dense,
                sparse,
                limit: pool,
                offset: 0,
                filter,
                score_threshold: None,
            })
            .await?;
        debug!(candidates = candidates.len(), pool, "retrieved candidate pool");

        // Recency decay runs over the whole pool, before any truncation,
        // so an older high scorer can still be displaced into the page.
        if query.temporal_boost {
            for candidate in &mut candidates {
                candidate.score *=
                    decay_multiplier(candidate.memory.created_at, now, query.temporal_decay);
            }
            candidates.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let mut message = None;
        if rerank_active {
            match self.rerank(&query.query, &mut candidates).await {
                Ok(()) => {}
                Err(e) => {
                    warn!(error = %e, "reranking failed, keeping retrieval order");
                    message = Some("reranking unavailable, results in retrieval order".to_string());
                }
            }
        }

        let results: Vec<SearchResult> = candidates
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|c| {
                let highlights = extract_highlights(&query.query, &c.memory.content);
                SearchResult {
                    memory: c.memory,
                    score: c.score,
                    dense_score: c.dense_score,
                    sparse_score: c.sparse_score,
                    highlights,
                }
            })
            .collect();

        Ok(SearchResponse {
            success: true,
            query: query.query,
            mode: query.mode,
            total: results.len(),
            results,
            took_ms: start.elapsed().as_secs_f64() * 1000.0,
            message,
        })
    }

    /// Finds memories similar to an existing one, excluding it from the
    /// results. An unknown id or a memory with no content yields a failed
    /// response, not an error.
    pub async fn find_similar(&self, memory_id: Uuid, limit: usize) -> MnemaResult<SearchResponse> {
        let start = Instant::now();
        let Some(memory) = self.store.get(memory_id).await? else {
            return Ok(SearchResponse {
                success: false,
                query: String::new(),
                mode: SearchMode::Hybrid,
                results: Vec::new(),
                total: 0,
                took_ms: start.elapsed().as_secs_f64() * 1000.0,
                message: Some(format!("memory {memory_id} not found")),
            });
        };
        if memory.content.trim().is_empty() {
            return Ok(SearchResponse {
                success: false,
                query: String::new(),
                mode: SearchMode::Hybrid,
                results: Vec::new(),
                total: 0,
                took_ms: start.elapsed().as_secs_f64() * 1000.0,
                message: Some(format!("memory {memory_id} has no content")),
            });
        }

        // Over-fetch by one to absorb the self match.
        let query = SearchQuery::new(memory.content.clone())
            .with_limit((limit + 1).clamp(1, 100))
            .with_rerank(false);
        let mut response = self.search(query).await?;
        response.results.retain(|r| r.memory.id != memory_id);
        response.results.truncate(limit);
        response.total = response.results.len();
        response.took_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(response)
    }

    async fn rerank(&self, query_text: &str, candidates: &mut Vec<ScoredMemory>) -> MnemaResult<()> {
        let Some(encoder) = &self.cross_encoder else {
            return Ok(());
        };
        if candidates.is_empty() {
            return Ok(());
        }

        let passages: Vec<String> = candidates
            .iter()
            .map(|c| truncate_passage(&c.memory.content))
            .collect();
        let raw = tokio::time::timeout(self.config.rerank_timeout, encoder.score(query_text, &passages))
            .await
            .map_err(|_| {
                mnema_core::MnemaError::Embedding("cross-encoder timed out".to_string())
            })??;
        if raw.len() != candidates.len() {
            return Err(mnema_core::MnemaError::Embedding(format!(
                "cross-encoder returned {} scores for {} passages",
                raw.len(),
                candidates.len()
            )));
        }

        for (candidate, &logit) in candidates.iter_mut().zip(raw.iter()) {
            candidate.score = blend(candidate.score, logit);
        }
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::rerank::TermOverlapCrossEncoder;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use mnema_core::{Memory, MnemaError};
    use mnema_embedding::HashingEmbedding;
    use mnema_store::InMemoryVectorStore;

    struct FailingCrossEncoder;

    #[async_trait]
    impl CrossEncoder for FailingCrossEncoder {
        async fn score(&self, _query: &str, _passages: &[String]) -> MnemaResult<Vec<f32>> {
            Err(MnemaError::Embedding("model offline".to_string()))
        }
    }

    async fn seed(
        store: &InMemoryVectorStore,
        embedder: &HashingEmbedding,
        content: &str,
        age_days: i64,
    ) -> Uuid {
        let mut memory = Memory::new(content);
        memory.created_at = Utc::now() - ChronoDuration::days(age_days);
        let id = memory.id;
        let dense = embedder.embed_text(content).await.unwrap();
        let sparse = SparseEncoder::default().encode(content);
        let sparse = (!sparse.is_empty()).then_some(sparse);
        store.upsert(memory, dense, sparse).await.unwrap();
        id
    }

    fn engine_over(store: Arc<InMemoryVectorStore>) -> SearchEngine {
        SearchEngine::new(store, Arc::new(HashingEmbedding::new(256)))
            .with_cross_encoder(Arc::new(TermOverlapCrossEncoder))
    }

    #[tokio::test]
    async fn hybrid_search_finds_and_highlights() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        let target = seed(
            &store,
            &embedder,
            "The borrow checker enforces ownership. Lifetimes bound references.",
            0,
        )
        .await;
        seed(&store, &embedder, "Minestrone needs fresh basil and beans.", 0).await;

        let engine = engine_over(store);
        let response = engine
            .search(SearchQuery::new("ownership borrow checker"))
            .await
            .unwrap();

        assert!(response.success);
        assert!(response.total >= 1);
        assert_eq!(response.results[0].memory.id, target);
        assert!(!response.results[0].highlights.is_empty());
        assert!(response.results[0].highlights[0].contains("borrow checker"));
        assert!(response.took_ms >= 0.0);
    }

    #[tokio::test]
    async fn invalid_query_is_rejected_before_io() {
        let engine = engine_over(Arc::new(InMemoryVectorStore::new()));
        let err = engine.search(SearchQuery::new("  ")).await.unwrap_err();
        assert!(matches!(err, MnemaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn sparse_mode_with_no_indexable_terms_short_circuits() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        seed(&store, &embedder, "any document at all", 0).await;

        let engine = engine_over(store);
        // Stopwords and short tokens only.
        let query = SearchQuery::new("the a of to").with_mode(SearchMode::Sparse);
        let response = engine.search(query).await.unwrap();
        assert!(response.success);
        assert_eq!(response.total, 0);
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn temporal_boost_prefers_newer_among_equals() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        // Identical content: identical dense and sparse scores, so only
        // the decay multiplier separates them.
        let old = seed(&store, &embedder, "rust ownership notes", 300).await;
        let new = seed(&store, &embedder, "rust ownership notes", 0).await;

        let engine = engine_over(store);
        let boosted = engine
            .search(SearchQuery::new("rust ownership").with_rerank(false))
            .await
            .unwrap();
        assert_eq!(boosted.results[0].memory.id, new);
        assert_eq!(boosted.results[1].memory.id, old);
        assert!(boosted.results[0].score > boosted.results[1].score);
    }

    #[tokio::test]
    async fn temporal_boost_never_drops_results() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        for age in [0, 50, 400] {
            seed(&store, &embedder, "rust ownership notes", age).await;
        }

        let engine = engine_over(store);
        let with_boost = engine
            .search(SearchQuery::new("rust ownership").with_rerank(false))
            .await
            .unwrap();
        let without_boost = engine
            .search(
                SearchQuery::new("rust ownership")
                    .with_rerank(false)
                    .with_temporal_boost(false),
            )
            .await
            .unwrap();

        let mut ids_a: Vec<Uuid> = with_boost.results.iter().map(|r| r.memory.id).collect();
        let mut ids_b: Vec<Uuid> = without_boost.results.iter().map(|r| r.memory.id).collect();
        ids_a.sort();
        ids_b.sort();
        assert_eq!(ids_a, ids_b, "decay reorders, it must not filter");
    }

    #[tokio::test]
    async fn rerank_failure_degrades_with_message() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        seed(&store, &embedder, "rust ownership notes", 0).await;

        let engine = SearchEngine::new(store, Arc::new(HashingEmbedding::new(256)))
            .with_cross_encoder(Arc::new(FailingCrossEncoder));
        let response = engine.search(SearchQuery::new("rust ownership")).await.unwrap();
        assert!(response.success);
        assert_eq!(response.total, 1);
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn find_similar_excludes_self() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        let anchor = seed(&store, &embedder, "rust ownership and borrowing", 0).await;
        let neighbor = seed(&store, &embedder, "borrowing rules in rust ownership", 0).await;
        seed(&store, &embedder, "minestrone soup recipe basil", 0).await;

        let engine = engine_over(store);
        let response = engine.find_similar(anchor, 2).await.unwrap();
        assert!(response.success);
        assert!(response.results.iter().all(|r| r.memory.id != anchor));
        assert_eq!(response.results[0].memory.id, neighbor);
    }

    #[tokio::test]
    async fn find_similar_unknown_id_fails_softly() {
        let engine = engine_over(Arc::new(InMemoryVectorStore::new()));
        let response = engine.find_similar(Uuid::new_v4(), 5).await.unwrap();
        assert!(!response.success);
        assert!(response.message.is_some());
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn find_similar_empty_content_fails_softly() {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = HashingEmbedding::new(256);
        let empty = seed(&store, &embedder, "", 0).await;
        seed(&store, &embedder, "rust ownership and borrowing", 0).await;

        let engine = engine_over(store);
        let response = engine.find_similar(empty, 5).await.unwrap();
        assert!(!response.success);
        assert!(response.results.is_empty());
        assert!(response.message.unwrap().contains("no content"));
    }
}
