//! Cross-encoder reranking.
//!
//! A cross-encoder reads the query and a candidate passage together and
//! emits a raw relevance logit, typically in `[-10, 10]`. The engine
//! normalizes that logit to `[0, 1]` and blends it with the retrieval
//! score, weighting the cross-encoder more heavily.

use async_trait::async_trait;
use std::collections::HashSet;

use mnema_core::MnemaResult;

/// Shift added to a raw cross-encoder logit before normalization.
pub const RERANK_SCORE_SHIFT: f32 = 10.0;
/// Range the shifted logit is divided by to land in `[0, 1]`.
pub const RERANK_SCORE_RANGE: f32 = 20.0;
/// Weight of the original retrieval score in the blended result.
pub const RETRIEVAL_WEIGHT: f32 = 0.3;
/// Weight of the normalized cross-encoder score in the blended result.
pub const RERANK_WEIGHT: f32 = 0.7;
/// Passages are truncated to this many characters before scoring.
pub const PASSAGE_CHAR_LIMIT: usize = 512;

/// Scores query/passage pairs jointly.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    /// Returns one raw relevance score per passage, in passage order.
    async fn score(&self, query: &str, passages: &[String]) -> MnemaResult<Vec<f32>>;
}

/// Blends a retrieval score with a raw cross-encoder logit.
pub fn blend(retrieval_score: f32, raw: f32) -> f32 {
    let normalized = ((raw + RERANK_SCORE_SHIFT) / RERANK_SCORE_RANGE).clamp(0.0, 1.0);
    RETRIEVAL_WEIGHT * retrieval_score + RERANK_WEIGHT * normalized
}

/// Truncates a passage to [`PASSAGE_CHAR_LIMIT`] characters.
pub fn truncate_passage(content: &str) -> String {
    content.chars().take(PASSAGE_CHAR_LIMIT).collect()
}

/// Deterministic local cross-encoder scoring by query-term coverage.
///
/// Emits a logit proportional to the fraction of query terms present in
/// the passage, spanning the full `[-10, 10]` range. A stand-in for a
/// model-backed encoder in tests and offline deployments.
#[derive(Debug, Default, Clone)]
pub struct TermOverlapCrossEncoder;

impl TermOverlapCrossEncoder {
    fn coverage(query: &str, passage: &str) -> f32 {
        let terms: HashSet<String> = tokenize(query).collect();
        if terms.is_empty() {
            return 0.0;
        }
        let passage_terms: HashSet<String> = tokenize(passage).collect();
        let hits = terms.intersection(&passage_terms).count();
        hits as f32 / terms.len() as f32
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl CrossEncoder for TermOverlapCrossEncoder {
    async fn score(&self, query: &str, passages: &[String]) -> MnemaResult<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| Self::coverage(query, p) * RERANK_SCORE_RANGE - RERANK_SCORE_SHIFT)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn blend_clamps_raw_range() {
        // raw above the range saturates the normalized term at 1.0
        let high = blend(0.0, 50.0);
        assert!((high - RERANK_WEIGHT).abs() < 1e-6);
        // raw below the range saturates at 0.0
        let low = blend(1.0, -50.0);
        assert!((low - RETRIEVAL_WEIGHT).abs() < 1e-6);
    }

    #[test]
    fn blend_weights_sum_to_one() {
        assert!((RETRIEVAL_WEIGHT + RERANK_WEIGHT - 1.0).abs() < 1e-6);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_passage(&long);
        assert_eq!(truncated.chars().count(), PASSAGE_CHAR_LIMIT);
    }

    #[tokio::test]
    async fn overlap_encoder_orders_by_coverage() {
        let encoder = TermOverlapCrossEncoder;
        let passages = vec![
            "rust ownership and borrowing".to_string(),
            "ownership only".to_string(),
            "nothing relevant here".to_string(),
        ];
        let scores = encoder.score("rust ownership", &passages).await.unwrap();
        assert!(scores[0] > scores[1]);
        assert!(scores[1] > scores[2]);
        // Full coverage reaches the top of the logit range.
        assert!((scores[0] - RERANK_SCORE_SHIFT).abs() < 1e-6);
        // Zero coverage reaches the bottom.
        assert!((scores[2] + RERANK_SCORE_SHIFT).abs() < 1e-6);
    }

    #[tokio::test]
    async fn overlap_encoder_is_case_insensitive() {
        let encoder = TermOverlapCrossEncoder;
        let scores = encoder
            .score("RUST", &["learning rust daily".to_string()])
            .await
            .unwrap();
        assert!((scores[0] - RERANK_SCORE_SHIFT).abs() < 1e-6);
    }
}
