use serde::{Deserialize, Serialize};

/// A contiguous slice of a book. Identified by `(book_id, chunk_index)`; the
/// `chunk_id` string is derived from that pair and never changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub book_id: String,
    pub chunk_index: usize,
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    pub offset: (usize, usize), // [start, end) byte positions in the source text
}

impl Chunk {
    pub fn new(
        book_id: String,
        chunk_index: usize,
        text: String,
        source: String,
        offset: (usize, usize),
    ) -> Self {
        let chunk_id = Self::compose_id(&book_id, chunk_index);

        Self {
            book_id,
            chunk_index,
            chunk_id,
            text,
            source,
            offset,
        }
    }

    pub fn compose_id(book_id: &str, chunk_index: usize) -> String {
        format!("{}:{}", book_id, chunk_index)
    }

    /// Estimate token count (rough: 1.3 tokens per word)
    pub fn estimated_tokens(&self) -> usize {
        crate::chunker::estimate_tokens(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable_for_book_and_index() {
        let a = Chunk::new("book".into(), 3, "one".into(), "a.txt".into(), (0, 3));
        let b = Chunk::new("book".into(), 3, "two".into(), "a.txt".into(), (10, 13));

        assert_eq!(a.chunk_id, "book:3");
        assert_eq!(a.chunk_id, b.chunk_id);
    }
}
