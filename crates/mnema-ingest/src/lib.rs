//! Document ingestion: chunking plus the chunk-embed-upsert pipeline.

pub mod chunker;
pub mod ingestor;

pub use chunker::{ChunkStrategy, DocumentChunk, TextChunker};
pub use ingestor::{IngestReport, Ingestor};
