use unicode_segmentation::UnicodeSegmentation;

use crate::chunk::Chunk;

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 900,
            overlap_tokens: 100,
        }
    }
}

/// Rough token estimate: ~1.3 tokens per whitespace-separated word.
pub fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f64 * 1.3) as usize
}

/// A paragraph or sentence span of the source text.
#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    tokens: usize,
    heading: bool,
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split a book into chunks. Markdown headings always start a new chunk;
    /// otherwise paragraphs are packed up to `max_tokens`, with oversized
    /// paragraphs broken at sentence boundaries. Consecutive chunks inside a
    /// section share up to `overlap_tokens` of trailing text.
    pub fn chunk_text(&self, book_id: &str, text: &str, source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut buffer: Vec<Unit> = Vec::new();
        let mut buffer_tokens = 0;

        for unit in self.units(text) {
            let overflow = buffer_tokens + unit.tokens > self.config.max_tokens;
            if !buffer.is_empty() && (unit.heading || overflow) {
                chunks.push(self.make_chunk(book_id, chunks.len(), text, &buffer, source));

                buffer = if unit.heading {
                    Vec::new()
                } else {
                    self.overlap(&buffer)
                };
                buffer_tokens = buffer.iter().map(|u| u.tokens).sum();
            }

            buffer_tokens += unit.tokens;
            buffer.push(unit);
        }

        if !buffer.is_empty() {
            chunks.push(self.make_chunk(book_id, chunks.len(), text, &buffer, source));
        }

        chunks
    }

    fn make_chunk(
        &self,
        book_id: &str,
        chunk_index: usize,
        text: &str,
        units: &[Unit],
        source: &str,
    ) -> Chunk {
        let start = units[0].start;
        let end = units[units.len() - 1].end;

        Chunk::new(
            book_id.to_string(),
            chunk_index,
            text[start..end].to_string(),
            source.to_string(),
            (start, end),
        )
    }

    fn units(&self, text: &str) -> Vec<Unit> {
        let mut units = Vec::new();

        for (start, end) in paragraph_spans(text) {
            let paragraph = &text[start..end];
            let tokens = estimate_tokens(paragraph);
            let heading = paragraph.starts_with('#');

            if tokens <= self.config.max_tokens {
                units.push(Unit { start, end, tokens, heading });
                continue;
            }

            let mut first = true;
            for (offset, sentence) in paragraph.split_sentence_bound_indices() {
                let trimmed = sentence.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let lead = sentence.len() - sentence.trim_start().len();
                let sentence_start = start + offset + lead;
                units.push(Unit {
                    start: sentence_start,
                    end: sentence_start + trimmed.len(),
                    tokens: estimate_tokens(trimmed),
                    heading: heading && first,
                });
                first = false;
            }
        }

        units
    }

    /// Trailing units that fit in the overlap budget; never the whole buffer.
    fn overlap(&self, buffer: &[Unit]) -> Vec<Unit> {
        let mut kept = Vec::new();
        let mut tokens = 0;

        for unit in buffer.iter().rev().take(buffer.len().saturating_sub(1)) {
            if tokens + unit.tokens > self.config.overlap_tokens {
                break;
            }
            tokens += unit.tokens;
            kept.push(*unit);
        }

        kept.reverse();
        kept
    }
}

/// Byte spans of paragraphs: runs of non-blank lines, with every markdown
/// heading line starting a new paragraph.
fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut pos = 0;

    for line in text.split_inclusive('\n') {
        let line_start = pos;
        pos += line.len();

        let content = line.trim();
        if content.is_empty() {
            if let Some(span) = current.take() {
                spans.push(span);
            }
            continue;
        }

        let start = line_start + (line.len() - line.trim_start().len());
        let end = start + content.len();

        if content.starts_with('#') {
            if let Some(span) = current.take() {
                spans.push(span);
            }
        }

        current = Some(match current {
            Some((s, _)) => (s, end),
            None => (start, end),
        });
    }

    if let Some(span) = current {
        spans.push(span);
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_chunking() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let text = "This is a test paragraph.\n\nThis is another paragraph.";
        let chunks = chunker.chunk_text("test-book", text, "test.txt");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].book_id, "test-book");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn headings_start_new_chunks() {
        let chunker = Chunker::new(ChunkerConfig::default());
        let text = "# One\nalpha beta\n# Two\ngamma delta\n";
        let chunks = chunker.chunk_text("b", text, "b.md");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "# One\nalpha beta");
        assert_eq!(chunks[1].text, "# Two\ngamma delta");
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn offsets_point_back_into_source() {
        let chunker = Chunker::new(ChunkerConfig {
            max_tokens: 6,
            overlap_tokens: 0,
        });
        let text = "one two three four\n\nfive six seven eight\n\nnine ten";
        let chunks = chunker.chunk_text("b", text, "b.txt");

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(&text[chunk.offset.0..chunk.offset.1], chunk.text);
        }
    }

    #[test]
    fn long_paragraph_splits_on_sentences_with_overlap() {
        let chunker = Chunker::new(ChunkerConfig {
            max_tokens: 8,
            overlap_tokens: 4,
        });
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta iota. Kappa lambda mu.";
        let chunks = chunker.chunk_text("b", text, "b.txt");

        assert!(chunks.len() > 1);
        // The second chunk repeats the last sentence of the first.
        assert!(chunks[1].text.starts_with("Delta epsilon zeta."));
        assert!(chunks.iter().all(|c| c.estimated_tokens() <= 8));
    }
}
