pub mod embeddings;
pub mod error;
pub mod memory_store;
pub mod model;
pub mod neo4j_store;
pub mod store;
pub mod summarize;

pub use embeddings::{cosine_similarity, EmbedOptions, Embedder, EmbeddingConfig, OllamaEmbedder};
pub use error::GraphError;
pub use memory_store::MemoryGraphStore;
pub use model::*;
pub use neo4j_store::{Neo4jConfig, Neo4jStore};
pub use store::GraphStore;
pub use summarize::{ConsolidationConfig, ConsolidationSummary, DescriptionConsolidator};

use anyhow::{Context, Result};
use extract::Extractor;
use futures::stream::{self, StreamExt};
use ingest::Chunk;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub entities: usize,
    pub relationships: usize,
}

/// Extracts chunks and persists the results into the graph.
pub struct Indexer {
    extractor: Arc<Extractor>,
    store: Arc<dyn GraphStore>,
    max_concurrent: usize,
}

impl Indexer {
    pub fn new(extractor: Arc<Extractor>, store: Arc<dyn GraphStore>, max_concurrent: usize) -> Self {
        Self {
            extractor,
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.store
            .init_schema()
            .await
            .context("Failed to initialize graph schema")
    }

    async fn index_chunk(&self, chunk: &Chunk) -> Result<(usize, usize)> {
        let extracted = self
            .extractor
            .extract_chunk(chunk.chunk_id.clone(), chunk.book_id.clone(), &chunk.text)
            .await
            .with_context(|| format!("extraction failed for {}", chunk.chunk_id))?;
        let extraction = &extracted.extraction;

        self.store
            .write_chunk(&extracted.book_id, &extracted.chunk_id, &chunk.text, extraction)
            .await
            .with_context(|| format!("persisting {} failed", chunk.chunk_id))?;

        Ok((extraction.entities.len(), extraction.relationships.len()))
    }

    /// Extract and persist every chunk, at most `max_concurrent` at a time.
    /// A failing chunk is logged and counted; the batch carries on. Fails only
    /// when the store is unreachable before any work starts.
    pub async fn index_chunks(&self, chunks: &[Chunk]) -> Result<IngestSummary> {
        self.store
            .health_check()
            .await
            .context("graph store unavailable for ingestion")?;

        let tasks: Vec<_> = chunks
            .iter()
            .map(|chunk| async move { (chunk.chunk_id.as_str(), self.index_chunk(chunk).await) })
            .collect();
        let results: Vec<_> = stream::iter(tasks)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut summary = IngestSummary::default();
        for (chunk_id, result) in results {
            match result {
                Ok((entities, relationships)) => {
                    summary.chunks_succeeded += 1;
                    summary.entities += entities;
                    summary.relationships += relationships;
                }
                Err(e) => {
                    warn!(chunk_id, error = %e, "chunk failed");
                    summary.chunks_failed += 1;
                }
            }
        }

        info!(?summary, "chunks indexed");
        Ok(summary)
    }
}
