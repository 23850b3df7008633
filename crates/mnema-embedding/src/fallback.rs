use async_trait::async_trait;
use mnema_core::{MnemaError, MnemaResult};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::provider::EmbeddingProvider;

/// Default fan-out limit for batch embedding.
const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// A primary embedding provider backed by a secondary fallback.
///
/// Single-text calls fall back wholesale when the primary fails. Batch calls
/// embed items concurrently under a fixed fan-out limit and fall back
/// per-item, so one transient failure does not fail the whole batch.
pub struct FallbackEmbedding {
    primary: Arc<dyn EmbeddingProvider>,
    secondary: Arc<dyn EmbeddingProvider>,
    fan_out: Arc<Semaphore>,
}

impl FallbackEmbedding {
    /// Combine a primary and a secondary provider.
    ///
    /// Both should produce vectors of the same dimension; the primary's
    /// dimension is authoritative.
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        secondary: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            primary,
            secondary,
            fan_out: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        }
    }

    /// Set the batch fan-out limit. Chainable.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.fan_out = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    async fn embed_one(
        primary: Arc<dyn EmbeddingProvider>,
        secondary: Arc<dyn EmbeddingProvider>,
        text: String,
    ) -> MnemaResult<Vec<f32>> {
        match primary.embed_text(&text).await {
            Ok(vector) => Ok(vector),
            Err(e) => {
                warn!(error = %e, "Primary embedding failed, falling back");
                secondary.embed_text(&text).await
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbedding {
    async fn embed_text(&self, text: &str) -> MnemaResult<Vec<f32>> {
        Self::embed_one(
            Arc::clone(&self.primary),
            Arc::clone(&self.secondary),
            text.to_string(),
        )
        .await
    }

    async fn embed_query(&self, query: &str) -> MnemaResult<Vec<f32>> {
        match self.primary.embed_query(query).await {
            Ok(vector) => Ok(vector),
            Err(e) => {
                warn!(error = %e, "Primary query embedding failed, falling back");
                self.secondary.embed_query(query).await
            }
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> MnemaResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut tasks = JoinSet::new();
        for (index, text) in texts.iter().enumerate() {
            let primary = Arc::clone(&self.primary);
            let secondary = Arc::clone(&self.secondary);
            let fan_out = Arc::clone(&self.fan_out);
            let text = (*text).to_string();
            tasks.spawn(async move {
                // Closed only if the semaphore is dropped, which cannot
                // happen while tasks hold an Arc to it.
                let _permit = fan_out.acquire_owned().await;
                (index, Self::embed_one(primary, secondary, text).await)
            });
        }

        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) =
                joined.map_err(|e| MnemaError::Embedding(format!("embed task panicked: {e}")))?;
            results[index] = Some(result?);
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.primary.dimension()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::provider::HashingEmbedding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that fails every call, counting attempts.
    struct FailingProvider {
        calls: AtomicUsize,
        dimension: usize,
    }

    impl FailingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                dimension,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed_text(&self, _text: &str) -> MnemaResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MnemaError::Http("backend unavailable".into()))
        }

        async fn embed_query(&self, query: &str) -> MnemaResult<Vec<f32>> {
            self.embed_text(query).await
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[tokio::test]
    async fn single_text_falls_back() {
        let primary = Arc::new(FailingProvider::new(64));
        let secondary = Arc::new(HashingEmbedding::new(64));
        let fallback = FallbackEmbedding::new(primary.clone(), secondary);

        let v = fallback.embed_text("hello world").await.unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().any(|&x| x != 0.0));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batch_falls_back_per_item_and_preserves_order() {
        let primary = Arc::new(FailingProvider::new(32));
        let secondary = Arc::new(HashingEmbedding::new(32));
        let fallback =
            FallbackEmbedding::new(primary, secondary.clone()).with_max_concurrency(4);

        let texts = ["alpha beta", "", "gamma delta"];
        let vecs = fallback.embed_batch(&texts).await.unwrap();
        assert_eq!(vecs.len(), 3);

        // Each slot must match the secondary's encoding of the same text.
        for (text, vec) in texts.iter().zip(&vecs) {
            let expected = secondary.embed_text(text).await.unwrap();
            assert_eq!(vec, &expected, "order must be preserved for {text:?}");
        }
        assert!(vecs[1].iter().all(|&x| x == 0.0), "empty entry stays zeroed");
    }

    #[tokio::test]
    async fn healthy_primary_is_used() {
        let primary = Arc::new(HashingEmbedding::new(16));
        let secondary = Arc::new(FailingProvider::new(16));
        let fallback = FallbackEmbedding::new(primary, secondary.clone());

        let v = fallback.embed_text("healthy path").await.unwrap();
        assert_eq!(v.len(), 16);
        assert_eq!(
            secondary.calls.load(Ordering::SeqCst),
            0,
            "secondary must not be touched when the primary succeeds"
        );
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let fallback = FallbackEmbedding::new(
            Arc::new(HashingEmbedding::new(8)),
            Arc::new(HashingEmbedding::new(8)),
        );
        let vecs = fallback.embed_batch(&[]).await.unwrap();
        assert!(vecs.is_empty());
    }
}
