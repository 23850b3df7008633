//! Splitting documents into indexable chunks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Default target chunk size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Default overlap carried between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// How a document is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed-size windows broken at word boundaries.
    Fixed,
    /// Sentences packed up to the target size, split at paragraph and
    /// sentence boundaries, with tail overlap between chunks.
    Semantic,
    /// Split at markdown-style section headers; oversized sections fall
    /// back to semantic packing.
    Section,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::Semantic
    }
}

/// One chunk of a source document, with position and content flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// The chunk text.
    pub content: String,
    /// Zero-based position in the document's chunk sequence.
    pub chunk_index: usize,
    /// Total number of chunks the document produced.
    pub total_chunks: usize,
    /// Approximate start offset in the source text.
    pub start_char: usize,
    /// Approximate end offset in the source text.
    pub end_char: usize,
    /// Chunk looks like tabular data.
    pub is_table: bool,
    /// Chunk looks like source code.
    pub is_code: bool,
    /// Chunk is primarily a heading.
    pub is_header: bool,
}

/// Splits text into [`DocumentChunk`]s with a configurable strategy.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    strategy: ChunkStrategy,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            strategy: ChunkStrategy::default(),
        }
    }
}

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"(?s)[^.!?]*[.!?]+|[^.!?]+$").expect("valid sentence regex"))
}

fn paragraph_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"))
}

fn header_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^(#{1,6}\s+.+|[A-Z][A-Z\s]+:?)$").expect("valid header regex"))
}

impl TextChunker {
    /// Creates a chunker with the given target size and overlap.
    pub fn new(chunk_size: usize, chunk_overlap: usize, strategy: ChunkStrategy) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            strategy,
        }
    }

    /// Splits text into chunks. Empty or whitespace-only input yields no
    /// chunks rather than an error.
    pub fn chunk_text(&self, text: &str) -> Vec<DocumentChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let raw = match self.strategy {
            ChunkStrategy::Fixed => self.fixed_chunks(text),
            ChunkStrategy::Semantic => self.semantic_chunks(text),
            ChunkStrategy::Section => self.section_chunks(text),
        };

        let total = raw.len();
        raw.into_iter()
            .enumerate()
            .map(|(idx, (content, start, end))| {
                let is_table = detect_table(&content);
                let is_code = detect_code(&content);
                let is_header = detect_header(&content);
                DocumentChunk {
                    content,
                    chunk_index: idx,
                    total_chunks: total,
                    start_char: start,
                    end_char: end,
                    is_table,
                    is_code,
                    is_header,
                }
            })
            .collect()
    }

    fn fixed_chunks(&self, text: &str) -> Vec<(String, usize, usize)> {
        let mut chunks = Vec::new();
        let text_len = text.len();
        let mut start = 0;

        while start < text_len {
            let mut end = (start + self.chunk_size).min(text_len);
            while end < text_len && !text.is_char_boundary(end) {
                end -= 1;
            }

            // Break at the last word boundary inside the window.
            if end < text_len {
                if let Some(last_space) = text[start..end].rfind(' ') {
                    if last_space > 0 {
                        end = start + last_space;
                    }
                }
            }

            let piece = text[start..end].trim();
            if !piece.is_empty() {
                chunks.push((piece.to_string(), start, end));
            }

            start = if end < text_len {
                end.saturating_sub(self.chunk_overlap).max(start + 1)
            } else {
                text_len
            };
            while start < text_len && !text.is_char_boundary(start) {
                start += 1;
            }
        }

        chunks
    }

    fn semantic_chunks(&self, text: &str) -> Vec<(String, usize, usize)> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_start = 0;
        let mut char_pos: usize = 0;

        for paragraph in paragraph_boundary().split(text) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                char_pos += 2;
                continue;
            }

            for sentence_match in sentence_boundary().find_iter(paragraph) {
                let sentence = sentence_match.as_str().trim();
                if sentence.is_empty() {
                    continue;
                }

                if !current.is_empty() && current.len() + sentence.len() + 1 > self.chunk_size {
                    chunks.push((current.trim().to_string(), current_start, char_pos));

                    // Seed the next chunk with the tail of this one so
                    // context carries across the boundary.
                    let overlap = self.overlap_tail(&current);
                    if overlap.is_empty() {
                        current = sentence.to_string();
                        current_start = char_pos;
                    } else {
                        current_start = char_pos.saturating_sub(overlap.len());
                        current = format!("{overlap} {sentence}");
                    }
                } else if current.is_empty() {
                    current = sentence.to_string();
                    current_start = char_pos;
                } else {
                    current.push(' ');
                    current.push_str(sentence);
                }

                char_pos += sentence.len() + 1;
            }

            char_pos += 2;
        }

        if !current.trim().is_empty() {
            chunks.push((current.trim().to_string(), current_start, char_pos));
        }

        chunks
    }

    fn section_chunks(&self, text: &str) -> Vec<(String, usize, usize)> {
        let mut sections = Vec::new();
        let mut current = String::new();
        let mut current_start = 0;
        let mut char_pos = 0;

        for line in text.split('\n') {
            if header_line().is_match(line.trim()) {
                if !current.trim().is_empty() {
                    sections.push((current.trim().to_string(), current_start, char_pos));
                }
                current = line.to_string();
                current_start = char_pos;
            } else {
                current.push('\n');
                current.push_str(line);
            }
            char_pos += line.len() + 1;
        }
        if !current.trim().is_empty() {
            sections.push((current.trim().to_string(), current_start, char_pos));
        }

        let mut chunks = Vec::new();
        for (section, start, end) in sections {
            if section.len() > self.chunk_size {
                for (sub, sub_start, sub_end) in self.semantic_chunks(&section) {
                    chunks.push((sub, start + sub_start, start + sub_end));
                }
            } else {
                chunks.push((section, start, end));
            }
        }

        if chunks.is_empty() {
            self.semantic_chunks(text)
        } else {
            chunks
        }
    }

    // Last `chunk_overlap` characters of a chunk, cut at a word boundary.
    fn overlap_tail(&self, text: &str) -> String {
        if text.len() <= self.chunk_overlap {
            return text.to_string();
        }
        let mut overlap_start = text.len() - self.chunk_overlap;
        while !text.is_char_boundary(overlap_start) {
            overlap_start += 1;
        }
        match text[overlap_start..].find(' ') {
            Some(space) => text[overlap_start + space + 1..].to_string(),
            None => text[overlap_start..].to_string(),
        }
    }
}

fn detect_table(text: &str) -> bool {
    if text.contains('|') && text.contains("-|-") {
        return true;
    }
    text.lines().filter(|line| line.contains('\t')).count() >= 2
}

fn detect_code(text: &str) -> bool {
    const INDICATORS: [&str; 12] = [
        "```", "fn ", "def ", "class ", "function ", "import ", "const ", "let ", "var ", "=>",
        "<?php", "#!/",
    ];
    INDICATORS.iter().any(|marker| text.contains(marker))
}

fn detect_header(text: &str) -> bool {
    let lines: Vec<&str> = text.trim().lines().collect();
    if lines.len() > 2 {
        return false;
    }
    let first = lines.first().map(|l| l.trim()).unwrap_or("");
    if first.is_empty() {
        return false;
    }
    let has_alpha = first.chars().any(|c| c.is_alphabetic());
    let all_upper = has_alpha && !first.chars().any(|c| c.is_lowercase());
    first.starts_with('#') || all_upper || first.ends_with(':')
}
