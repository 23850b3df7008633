use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use mnema_core::{Memory, MnemaError, MnemaResult};
use mnema_embedding::{cosine_similarity, SparseVector};

use crate::filter::MemoryFilter;

/// RRF smoothing constant. Higher values flatten rank differences.
const RRF_K: f32 = 60.0;
/// Rank assigned to a candidate absent from one retrieval list during
/// fusion, penalizing single-source matches.
const MISSING_RANK: f32 = 1000.0;
/// Per-side prefetch multiplier for fused retrieval.
const PREFETCH_FACTOR: usize = 2;

/// A record stored alongside its vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    memory: Memory,
    dense: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sparse: Option<SparseVector>,
}

/// A memory returned from a vector query with its scores.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    /// The matched memory payload.
    pub memory: Memory,
    /// The retrieval score (similarity, BM25 dot product, or fused RRF).
    pub score: f32,
    /// Dense sub-score, when dense retrieval participated.
    pub dense_score: Option<f32>,
    /// Sparse sub-score, when sparse retrieval participated.
    pub sparse_score: Option<f32>,
}

/// A retrieval request against the store.
///
/// With only a dense vector the store runs semantic retrieval; with only a
/// sparse vector, keyword retrieval; with both, two independent top-K
/// retrievals fused by Reciprocal Rank Fusion. Dense cosine and BM25 scores
/// live on incomparable scales, so fusion uses rank position only.
#[derive(Debug, Clone, Default)]
pub struct VectorQuery {
    /// Query-side dense embedding.
    pub dense: Option<Vec<f32>>,
    /// Query-side sparse vector.
    pub sparse: Option<SparseVector>,
    /// Maximum results to return.
    pub limit: usize,
    /// Pagination offset, applied after ranking.
    pub offset: usize,
    /// Structural payload filter.
    pub filter: Option<MemoryFilter>,
    /// Drop results scoring below this threshold.
    pub score_threshold: Option<f32>,
}

/// Trait for hybrid vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a memory with its vectors. Idempotent by id: a
    /// second upsert for the same id replaces the stored record, bumping
    /// the memory's version and `updated_at`.
    async fn upsert(
        &self,
        memory: Memory,
        dense: Vec<f32>,
        sparse: Option<SparseVector>,
    ) -> MnemaResult<()>;

    /// Upsert a batch of records in one call.
    async fn upsert_batch(
        &self,
        records: Vec<(Memory, Vec<f32>, Option<SparseVector>)>,
    ) -> MnemaResult<usize> {
        let total = records.len();
        for (memory, dense, sparse) in records {
            self.upsert(memory, dense, sparse).await?;
        }
        Ok(total)
    }

    /// Run a dense / sparse / fused retrieval.
    async fn query(&self, query: VectorQuery) -> MnemaResult<Vec<ScoredMemory>>;

    /// Fetch a memory by id.
    async fn get(&self, id: Uuid) -> MnemaResult<Option<Memory>>;

    /// Delete a memory by id, returning whether it existed.
    async fn delete(&self, id: Uuid) -> MnemaResult<bool>;

    /// List memories with optional filtering, newest first.
    async fn list(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<MemoryFilter>,
    ) -> MnemaResult<Vec<Memory>>;

    /// Count stored memories.
    async fn count(&self) -> MnemaResult<usize>;
}

/// In-memory hybrid store using brute-force scoring.
///
/// Suitable for tests and small corpora (<100k entries); the production
/// deployment points the same trait at an external vector database.
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<Uuid, StoredRecord>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Rank candidates by dense cosine similarity, best first.
    fn rank_dense(candidates: &[&StoredRecord], query: &[f32], top_k: usize) -> Vec<(Uuid, f32)> {
        let mut scored: Vec<(Uuid, f32)> = candidates
            .iter()
            .map(|r| (r.memory.id, cosine_similarity(query, &r.dense)))
            .collect();
        sort_descending(&mut scored);
        scored.truncate(top_k);
        scored
    }

    /// Rank candidates by sparse dot product, best first. Candidates with
    /// no term overlap are excluded.
    fn rank_sparse(
        candidates: &[&StoredRecord],
        query: &SparseVector,
        top_k: usize,
    ) -> Vec<(Uuid, f32)> {
        let mut scored: Vec<(Uuid, f32)> = candidates
            .iter()
            .filter_map(|r| {
                let sparse = r.sparse.as_ref()?;
                let score = sparse.dot(query);
                (score > 0.0).then_some((r.memory.id, score))
            })
            .collect();
        sort_descending(&mut scored);
        scored.truncate(top_k);
        scored
    }

    /// Fuse dense and sparse rankings with Reciprocal Rank Fusion.
    fn fuse(dense: &[(Uuid, f32)], sparse: &[(Uuid, f32)]) -> Vec<(Uuid, f32, Option<f32>, Option<f32>)> {
        let dense_ranks: HashMap<Uuid, (f32, f32)> = dense
            .iter()
            .enumerate()
            .map(|(rank, &(id, score))| (id, ((rank + 1) as f32, score)))
            .collect();
        let sparse_ranks: HashMap<Uuid, (f32, f32)> = sparse
            .iter()
            .enumerate()
            .map(|(rank, &(id, score))| (id, ((rank + 1) as f32, score)))
            .collect();

        let mut ids: Vec<Uuid> = dense_ranks.keys().copied().collect();
        for id in sparse_ranks.keys() {
            if !dense_ranks.contains_key(id) {
                ids.push(*id);
            }
        }

        ids.into_iter()
            .map(|id| {
                let (d_rank, d_score) = dense_ranks
                    .get(&id)
                    .map_or((MISSING_RANK, None), |&(r, s)| (r, Some(s)));
                let (s_rank, s_score) = sparse_ranks
                    .get(&id)
                    .map_or((MISSING_RANK, None), |&(r, s)| (r, Some(s)));
                let fused = 1.0 / (RRF_K + d_rank) + 1.0 / (RRF_K + s_rank);
                (id, fused, d_score, s_score)
            })
            .collect()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        mut memory: Memory,
        dense: Vec<f32>,
        sparse: Option<SparseVector>,
    ) -> MnemaResult<()> {
        let mut records = self.records.write().await;
        if let Some(previous) = records.get(&memory.id) {
            memory.version = previous.memory.version + 1;
            memory.updated_at = chrono::Utc::now();
        }
        records.insert(
            memory.id,
            StoredRecord {
                memory,
                dense,
                sparse,
            },
        );
        Ok(())
    }

    async fn query(&self, query: VectorQuery) -> MnemaResult<Vec<ScoredMemory>> {
        if query.dense.is_none() && query.sparse.is_none() {
            return Err(MnemaError::InvalidInput(
                "query needs a dense or sparse vector".into(),
            ));
        }

        let records = self.records.read().await;
        let candidates: Vec<&StoredRecord> = records
            .values()
            .filter(|r| {
                query
                    .filter
                    .as_ref()
                    .is_none_or(|f| f.matches(&r.memory))
            })
            .collect();

        let prefetch = query.limit.saturating_mul(PREFETCH_FACTOR).max(query.limit);

        // (id, fused score, dense sub-score, sparse sub-score)
        let mut ranked: Vec<(Uuid, f32, Option<f32>, Option<f32>)> =
            match (&query.dense, &query.sparse) {
                (Some(dense), Some(sparse)) => {
                    let dense_top = Self::rank_dense(&candidates, dense, prefetch);
                    let sparse_top = Self::rank_sparse(&candidates, sparse, prefetch);
                    Self::fuse(&dense_top, &sparse_top)
                }
                (Some(dense), None) => Self::rank_dense(&candidates, dense, usize::MAX)
                    .into_iter()
                    .map(|(id, score)| (id, score, Some(score), None))
                    .collect(),
                (None, Some(sparse)) => Self::rank_sparse(&candidates, sparse, usize::MAX)
                    .into_iter()
                    .map(|(id, score)| (id, score, None, Some(score)))
                    .collect(),
                (None, None) => unreachable!(),
            };

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ranked
            .into_iter()
            .filter(|&(_, score, _, _)| {
                query.score_threshold.is_none_or(|threshold| score >= threshold)
            })
            .skip(query.offset)
            .take(query.limit)
            .filter_map(|(id, score, dense_score, sparse_score)| {
                records.get(&id).map(|r| ScoredMemory {
                    memory: r.memory.clone(),
                    score,
                    dense_score,
                    sparse_score,
                })
            })
            .collect())
    }

    async fn get(&self, id: Uuid) -> MnemaResult<Option<Memory>> {
        let records = self.records.read().await;
        Ok(records.get(&id).map(|r| r.memory.clone()))
    }

    async fn delete(&self, id: Uuid) -> MnemaResult<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(&id).is_some())
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<MemoryFilter>,
    ) -> MnemaResult<Vec<Memory>> {
        let records = self.records.read().await;
        let mut memories: Vec<Memory> = records
            .values()
            .filter(|r| filter.as_ref().is_none_or(|f| f.matches(&r.memory)))
            .map(|r| r.memory.clone())
            .collect();
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(memories.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> MnemaResult<usize> {
        let records = self.records.read().await;
        Ok(records.len())
    }
}

fn sort_descending(scored: &mut [(Uuid, f32)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

/// File-backed store persisting records as JSONL.
///
/// Loads everything into the in-memory backend on creation; appends on
/// upsert of a new id, rewrites the file on delete or replacement.
pub struct FileVectorStore {
    path: std::path::PathBuf,
    inner: InMemoryVectorStore,
}

impl FileVectorStore {
    /// Open or create a store at the given path.
    pub async fn new(path: std::path::PathBuf) -> MnemaResult<Self> {
        let inner = InMemoryVectorStore::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            for line in data.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: StoredRecord = serde_json::from_str(line)
                    .map_err(|e| MnemaError::Store(format!("invalid JSONL record: {e}")))?;
                inner
                    .upsert(record.memory, record.dense, record.sparse)
                    .await?;
            }
            debug!(path = %path.display(), count = inner.count().await?, "Loaded vector store");
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self { path, inner })
    }

    async fn append_record(&self, record: &StoredRecord) -> MnemaResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }

    async fn rewrite_file(&self) -> MnemaResult<()> {
        let records = self.inner.records.read().await;
        let mut data = String::new();
        for record in records.values() {
            data.push_str(&serde_json::to_string(record)?);
            data.push('\n');
        }
        tokio::fs::write(&self.path, data.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for FileVectorStore {
    async fn upsert(
        &self,
        memory: Memory,
        dense: Vec<f32>,
        sparse: Option<SparseVector>,
    ) -> MnemaResult<()> {
        let replacing = self.inner.get(memory.id).await?.is_some();
        let record = StoredRecord {
            memory,
            dense,
            sparse,
        };
        self.inner
            .upsert(record.memory.clone(), record.dense.clone(), record.sparse.clone())
            .await?;
        if replacing {
            self.rewrite_file().await
        } else {
            self.append_record(&record).await
        }
    }

    async fn query(&self, query: VectorQuery) -> MnemaResult<Vec<ScoredMemory>> {
        self.inner.query(query).await
    }

    async fn get(&self, id: Uuid) -> MnemaResult<Option<Memory>> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: Uuid) -> MnemaResult<bool> {
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.rewrite_file().await?;
        }
        Ok(deleted)
    }

    async fn list(
        &self,
        limit: usize,
        offset: usize,
        filter: Option<MemoryFilter>,
    ) -> MnemaResult<Vec<Memory>> {
        self.inner.list(limit, offset, filter).await
    }

    async fn count(&self) -> MnemaResult<usize> {
        self.inner.count().await
    }
}
