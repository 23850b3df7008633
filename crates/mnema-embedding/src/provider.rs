use async_trait::async_trait;
use mnema_core::MnemaResult;
use std::collections::HashMap;

/// Trait for computing dense text embeddings.
///
/// Document-side and query-side encodings are separate methods because
/// asymmetric encoders (e.g. E5-style models) embed the two differently.
/// Symmetric backends may implement one in terms of the other.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute the document-side embedding for a single text.
    ///
    /// Empty or whitespace-only input yields a zero vector of the configured
    /// dimension, never an error.
    async fn embed_text(&self, text: &str) -> MnemaResult<Vec<f32>>;

    /// Compute the query-side embedding for a search string.
    async fn embed_query(&self, query: &str) -> MnemaResult<Vec<f32>>;

    /// Compute document-side embeddings for a batch of texts.
    ///
    /// Output order matches input order. Empty entries map to zero vectors.
    async fn embed_batch(&self, texts: &[&str]) -> MnemaResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_text(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Local deterministic hashed bag-of-words encoder.
///
/// Each token is hashed to three positions with decreasing weights and the
/// result is L2-normalized. No external model or network needed; good enough
/// for offline operation and tests, and the fallback target when a remote
/// backend is unavailable. This encoder is symmetric: query-side and
/// document-side embeddings are identical.
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    /// Create an encoder producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        if total == 0.0 {
            return vector;
        }

        // Three hash positions per word for better distribution.
        for (word, count) in &freq {
            let tf = count / total;
            let hash1 = fnv1a(word.as_bytes()) as usize;
            let hash2 = fnv1a(&[word.as_bytes(), &[1u8]].concat()) as usize;
            let hash3 = fnv1a(&[word.as_bytes(), &[2u8]].concat()) as usize;

            vector[hash1 % self.dimension] += tf;
            vector[hash2 % self.dimension] += tf * 0.7;
            vector[hash3 % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(768)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed_text(&self, text: &str) -> MnemaResult<Vec<f32>> {
        Ok(self.encode(text))
    }

    async fn embed_query(&self, query: &str) -> MnemaResult<Vec<f32>> {
        Ok(self.encode(query))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic FNV-1a hash.
pub(crate) fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Cosine similarity between two dense vectors.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
