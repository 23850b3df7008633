use async_trait::async_trait;
use mnema_core::{MnemaError, MnemaResult};
use std::time::Duration;
use tracing::debug;

use crate::provider::EmbeddingProvider;

/// Maximum number of texts sent in a single batch request.
const BATCH_SIZE: usize = 100;

/// Configuration for the remote embedding backend.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings API.
    pub base_url: String,
    /// Bearer token for the API.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Requested output dimensionality.
    pub dimension: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpEmbeddingConfig {
    /// Config with a 30 second timeout and the given endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Remote embedding backend speaking the OpenAI embeddings API.
///
/// Works with OpenAI and any provider implementing the same `/v1/embeddings`
/// contract. Query-side encoding passes a distinct `input_type` so that
/// asymmetric models encode queries and documents differently.
pub struct HttpEmbedding {
    config: HttpEmbeddingConfig,
    http: reqwest::Client,
}

impl HttpEmbedding {
    /// Create a backend from the given config.
    pub fn new(config: HttpEmbeddingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    async fn request(&self, inputs: &[&str], input_type: &str) -> MnemaResult<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "input": inputs,
            "input_type": input_type,
            "dimensions": self.config.dimension,
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MnemaError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MnemaError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(MnemaError::Http(format!(
                "embeddings API error {status}: {resp_body}"
            )));
        }

        parse_embeddings_response(&resp_body, inputs.len())
    }

    /// Embed a batch, mapping empty entries to zero vectors and batching the
    /// rest through the API in chunks.
    async fn embed_many(&self, texts: &[&str], input_type: &str) -> MnemaResult<Vec<Vec<f32>>> {
        let mut result = vec![vec![0.0f32; self.config.dimension]; texts.len()];

        let valid: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, *t))
            .collect();
        if valid.is_empty() {
            return Ok(result);
        }

        for chunk in valid.chunks(BATCH_SIZE) {
            let inputs: Vec<&str> = chunk.iter().map(|(_, t)| *t).collect();
            let embeddings = self.request(&inputs, input_type).await?;
            debug!(count = embeddings.len(), "Remote embeddings received");
            for ((index, _), embedding) in chunk.iter().zip(embeddings) {
                result[*index] = embedding;
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed_text(&self, text: &str) -> MnemaResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.config.dimension]);
        }
        let mut vectors = self.request(&[text], "document").await?;
        vectors
            .pop()
            .ok_or_else(|| MnemaError::Http("embeddings API returned no vectors".into()))
    }

    async fn embed_query(&self, query: &str) -> MnemaResult<Vec<f32>> {
        if query.trim().is_empty() {
            return Ok(vec![0.0; self.config.dimension]);
        }
        let mut vectors = self.request(&[query], "query").await?;
        vectors
            .pop()
            .ok_or_else(|| MnemaError::Http("embeddings API returned no vectors".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> MnemaResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_many(texts, "document").await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Parse an OpenAI-style embeddings response body.
///
/// Vectors are returned in `data[].index` order, which may differ from the
/// request order.
fn parse_embeddings_response(
    body: &serde_json::Value,
    expected: usize,
) -> MnemaResult<Vec<Vec<f32>>> {
    let data = body["data"]
        .as_array()
        .ok_or_else(|| MnemaError::Http(format!("malformed embeddings response: {body}")))?;

    if data.len() != expected {
        return Err(MnemaError::Http(format!(
            "embeddings API returned {} vectors, expected {expected}",
            data.len()
        )));
    }

    let mut vectors: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for item in data {
        let index = item["index"].as_u64().unwrap_or(vectors.len() as u64) as usize;
        let embedding = item["embedding"]
            .as_array()
            .ok_or_else(|| MnemaError::Http("embedding entry missing vector".into()))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        vectors.push((index, embedding));
    }
    vectors.sort_by_key(|&(index, _)| index);

    Ok(vectors.into_iter().map(|(_, v)| v).collect())
}
