use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::provider::fnv1a;

/// BM25 term-frequency saturation parameter.
const K1: f32 = 1.5;
/// BM25 length-normalization parameter.
const B: f32 = 0.75;

/// A sparse term-weight vector.
///
/// Indices are sorted ascending; the downstream store relies on this for
/// sparse-vector equality and diffing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    /// Hashed term indices, sorted ascending.
    pub indices: Vec<u32>,
    /// BM25-style weights, aligned with `indices`.
    pub values: Vec<f32>,
}

impl SparseVector {
    /// True when the vector has no terms.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product with another sparse vector.
    ///
    /// Linear merge over the two sorted index lists.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let mut sum = 0.0;
        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Configuration for the sparse vectorizer.
///
/// The hash index space and reference document length are deliberately
/// explicit: the index space trades collision rate against vector size, and
/// collisions are accepted (weights for colliding terms are summed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseConfig {
    /// Size of the hashed index space.
    pub dimension: u32,
    /// Reference average document length, in tokens.
    pub avg_doc_length: f32,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            dimension: 30_000,
            avg_doc_length: 500.0,
        }
    }
}

/// Deterministic BM25-style sparse vectorizer.
///
/// Used identically on the ingestion and query paths so that keyword overlap
/// between a query and a document is meaningful.
#[derive(Debug, Clone, Default)]
pub struct SparseEncoder {
    config: SparseConfig,
}

impl SparseEncoder {
    /// Create an encoder with the given configuration.
    pub fn new(config: SparseConfig) -> Self {
        Self { config }
    }

    /// Generate the sparse vector for a text.
    ///
    /// Weight per term:
    /// ```text
    /// tf' = tf * (k1 + 1) / (tf + k1 * (1 - b + b * doclen / avgdoclen))
    /// ```
    /// with `k1 = 1.5`, `b = 0.75`. Terms hash into the configured index
    /// space; colliding indices sum their weights. Empty input yields an
    /// empty vector, never an error.
    pub fn encode(&self, text: &str) -> SparseVector {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return SparseVector::default();
        }

        let doc_length = tokens.len() as f32;
        let mut term_freq: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let mut index_values: HashMap<u32, f32> = HashMap::new();
        for (term, tf) in &term_freq {
            let index = fnv1a(term.as_bytes()) % self.config.dimension;
            let weight = (tf * (K1 + 1.0))
                / (tf + K1 * (1.0 - B + B * doc_length / self.config.avg_doc_length));
            *index_values.entry(index).or_insert(0.0) += weight;
        }

        let mut sorted: Vec<(u32, f32)> = index_values.into_iter().collect();
        sorted.sort_by_key(|&(index, _)| index);

        SparseVector {
            indices: sorted.iter().map(|&(index, _)| index).collect(),
            values: sorted.iter().map(|&(_, value)| value).collect(),
        }
    }
}

/// Tokenize for sparse vectors: lowercase alphabetic runs, length > 2,
/// stopwords removed.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| t.len() > 2 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Common English stopwords excluded from sparse vectors.
const STOPWORDS: &[&str] = &[
    "the", "and", "but", "for", "with", "from", "about", "into", "through",
    "during", "are", "was", "were", "been", "being", "have", "has", "had",
    "does", "did", "will", "would", "could", "should", "may", "might",
    "this", "that", "these", "those", "its", "then",
];
