//! The chunk, embed, and upsert pipeline.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use mnema_core::{Memory, MemoryMetadata, MemoryModality, MemoryType, MnemaResult};
use mnema_embedding::{EmbeddingProvider, SparseEncoder};
use mnema_store::VectorStore;

use crate::chunker::{DocumentChunk, TextChunker};

/// Summary of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Ids of the memories created, in chunk order.
    pub memory_ids: Vec<Uuid>,
    /// Number of chunks the document was split into.
    pub chunks: usize,
}

/// Turns documents into stored, searchable memories.
pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    sparse_encoder: SparseEncoder,
    chunker: TextChunker,
}

impl Ingestor {
    /// Creates an ingestor with the default semantic chunker.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            sparse_encoder: SparseEncoder::default(),
            chunker: TextChunker::default(),
        }
    }

    /// Replaces the chunker. Chainable.
    pub fn with_chunker(mut self, chunker: TextChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Ingests one document: chunk, embed every chunk in one batch,
    /// sparse-encode, and upsert the lot. Returns the created ids.
    /// Empty input produces an empty report, not an error.
    pub async fn ingest(
        &self,
        text: &str,
        title: Option<&str>,
        memory_type: MemoryType,
        metadata: MemoryMetadata,
    ) -> MnemaResult<IngestReport> {
        let chunks = self.chunker.chunk_text(text);
        if chunks.is_empty() {
            return Ok(IngestReport {
                memory_ids: Vec::new(),
                chunks: 0,
            });
        }

        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let dense_vectors = self.embedder.embed_batch(&contents).await?;

        let total = chunks.len();
        let mut records = Vec::with_capacity(total);
        let mut memory_ids = Vec::with_capacity(total);
        for (chunk, dense) in chunks.into_iter().zip(dense_vectors) {
            let sparse = self.sparse_encoder.encode(&chunk.content);
            let sparse = (!sparse.is_empty()).then_some(sparse);
            let memory = self.build_memory(chunk, title, memory_type, &metadata);
            memory_ids.push(memory.id);
            records.push((memory, dense, sparse));
        }

        let stored = self.store.upsert_batch(records).await?;
        info!(chunks = total, stored, title = title.unwrap_or("<untitled>"), "ingested document");

        Ok(IngestReport {
            memory_ids,
            chunks: total,
        })
    }

    fn build_memory(
        &self,
        chunk: DocumentChunk,
        title: Option<&str>,
        memory_type: MemoryType,
        metadata: &MemoryMetadata,
    ) -> Memory {
        let chunk_title = match (title, chunk.total_chunks) {
            (Some(t), 1) => Some(t.to_string()),
            (Some(t), total) => Some(format!("{t} ({}/{total})", chunk.chunk_index + 1)),
            (None, _) => None,
        };

        let modality = if chunk.is_table {
            MemoryModality::Table
        } else if chunk.is_code {
            MemoryModality::Code
        } else {
            MemoryModality::Text
        };

        let mut metadata = metadata.clone();
        metadata
            .custom
            .insert("chunk_index".into(), chunk.chunk_index.into());
        metadata
            .custom
            .insert("total_chunks".into(), chunk.total_chunks.into());
        if chunk.is_header {
            metadata.custom.insert("is_header".into(), true.into());
        }

        let mut memory = Memory::new(chunk.content)
            .with_type(memory_type)
            .with_metadata(metadata);
        memory.modality = modality;
        if let Some(t) = chunk_title {
            memory = memory.with_title(t);
        }
        memory
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::chunker::ChunkStrategy;
    use mnema_embedding::HashingEmbedding;
    use mnema_store::InMemoryVectorStore;

    fn ingestor(store: Arc<InMemoryVectorStore>) -> Ingestor {
        Ingestor::new(store, Arc::new(HashingEmbedding::new(128)))
    }

    #[tokio::test]
    async fn empty_document_stores_nothing() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(store.clone())
            .ingest("   ", None, MemoryType::Document, MemoryMetadata::default())
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert!(report.memory_ids.is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn single_chunk_keeps_plain_title() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(store.clone())
            .ingest(
                "A short note about Rust lifetimes.",
                Some("Lifetimes"),
                MemoryType::Note,
                MemoryMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(report.chunks, 1);

        let memory = store.get(report.memory_ids[0]).await.unwrap().unwrap();
        assert_eq!(memory.title.as_deref(), Some("Lifetimes"));
        assert_eq!(memory.memory_type, MemoryType::Note);
        assert_eq!(memory.metadata.custom["chunk_index"], 0);
    }

    #[tokio::test]
    async fn long_document_chunks_number_their_titles() {
        let store = Arc::new(InMemoryVectorStore::new());
        let text = "Rust notes keep arriving every day. ".repeat(40);
        let ingestor = ingestor(store.clone()).with_chunker(TextChunker::new(
            120,
            20,
            ChunkStrategy::Semantic,
        ));
        let report = ingestor
            .ingest(&text, Some("Notebook"), MemoryType::Document, MemoryMetadata::default())
            .await
            .unwrap();
        assert!(report.chunks > 1);
        assert_eq!(store.count().await.unwrap(), report.chunks);

        let first = store.get(report.memory_ids[0]).await.unwrap().unwrap();
        assert_eq!(
            first.title.as_deref(),
            Some(format!("Notebook (1/{})", report.chunks).as_str())
        );
    }

    #[tokio::test]
    async fn code_chunks_get_code_modality() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(store.clone())
            .ingest(
                "fn main() { println!(\"hello\"); }",
                None,
                MemoryType::Document,
                MemoryMetadata::default(),
            )
            .await
            .unwrap();
        let memory = store.get(report.memory_ids[0]).await.unwrap().unwrap();
        assert_eq!(memory.modality, MemoryModality::Code);
    }

    #[tokio::test]
    async fn ingested_chunks_are_searchable_by_sparse_terms() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = ingestor(store.clone())
            .ingest(
                "Borrow checking prevents dangling references.",
                None,
                MemoryType::Document,
                MemoryMetadata::default(),
            )
            .await
            .unwrap();

        let results = store
            .query(mnema_store::VectorQuery {
                sparse: Some(SparseEncoder::default().encode("dangling references")),
                limit: 5,
                ..mnema_store::VectorQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory.id, report.memory_ids[0]);
    }
}
