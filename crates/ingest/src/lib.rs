pub mod chunk;
pub mod chunker;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig};
pub use reader::FileReader;

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// Generate a stable book ID from its file path
pub fn generate_book_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Chunk one file as a single book
pub async fn ingest_file(file_path: &Path, config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    let content = FileReader::read_file(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();
    let book_id = generate_book_id(&path_str);

    let chunker = Chunker::new(config.clone());
    let chunks = chunker.chunk_text(&book_id, &content, &path_str);
    info!(book_id = %book_id, chunks = chunks.len(), "chunked book");

    Ok(chunks)
}

/// Chunk every book below a directory
pub async fn ingest_directory(dir_path: &Path, config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    let files = FileReader::read_directory(dir_path).await?;
    let chunker = Chunker::new(config.clone());

    let mut all_chunks = Vec::new();

    for (path, content) in files {
        let book_id = generate_book_id(&path);
        let chunks = chunker.chunk_text(&book_id, &content, &path);
        info!(book_id = %book_id, chunks = chunks.len(), "chunked book");
        all_chunks.extend(chunks);
    }

    Ok(all_chunks)
}
