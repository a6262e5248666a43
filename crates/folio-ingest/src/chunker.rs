//! Recursive character splitting
//!
//! Text is split on the first separator of a strategy that occurs in it.
//! Pieces still at or above the target size are split again with the
//! remaining separators, and finally into single characters. Small pieces
//! are merged back up to the target size, and each merged chunk keeps a
//! tail of the previous one as overlap.
//!
//! All sizes are measured in characters, not bytes.

use folio_core::{Chunk, ChunkType};
use std::collections::VecDeque;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Chunking configuration for one content type
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub overlap: usize,

    /// Preferred split boundaries, most significant first
    pub separators: Vec<String>,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize, separators: &[&str]) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Headings first, then paragraphs and lines
    pub fn markdown() -> Self {
        Self::new(
            800,
            100,
            &["\n## ", "\n### ", "\n#### ", "\n\n", "\n", " "],
        )
    }

    /// Declarations first, then blank lines and lines
    pub fn code() -> Self {
        Self::new(
            600,
            80,
            &[
                "\nclass ",
                "\ndef ",
                "\nasync def ",
                "\nfn ",
                "\nfunc ",
                "\nfunction ",
                "\nexport ",
                "\n\n",
                "\n",
            ],
        )
    }

    /// Paragraphs, then sentences
    pub fn prose() -> Self {
        Self::new(500, 60, &["\n\n", ". ", "\n", " "])
    }

    pub fn portfolio() -> Self {
        Self::new(600, 80, &["\n\n", "\n"])
    }

    pub fn for_type(chunk_type: ChunkType) -> Self {
        match chunk_type {
            ChunkType::Markdown => Self::markdown(),
            ChunkType::Code => Self::code(),
            ChunkType::Prose => Self::prose(),
            ChunkType::Portfolio => Self::portfolio(),
        }
    }
}

/// Splits text into overlapping segments for one configuration
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    config: ChunkConfig,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Split text into trimmed, non-empty segments
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // An empty separator list means single characters
        let (separator, remaining): (&str, &[String]) =
            match separators.iter().position(|s| text.contains(s.as_str())) {
                Some(i) => (separators[i].as_str(), &separators[i + 1..]),
                None => ("", &[]),
            };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if separator.is_empty() {
                chunks.extend(trimmed(&piece));
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks
    }

    /// Greedily merge small pieces, carrying up to `overlap` characters forward
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.overlap;

        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > size && !window.is_empty() {
                merged.extend(join_window(&window));

                while total > overlap || (total > 0 && total + len > size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        merged.extend(join_window(&window));
        merged
    }
}

fn trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    trimmed(&joined)
}

/// Split on `separator`, keeping it at the start of the following piece
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            pieces.push(text[last..idx].to_string());
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(text[last..].to_string());
    }
    pieces
}

/// Per-content-type chunking front end
#[derive(Debug, Clone)]
pub struct Chunker {
    markdown: RecursiveSplitter,
    code: RecursiveSplitter,
    prose: RecursiveSplitter,
    portfolio: RecursiveSplitter,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            markdown: RecursiveSplitter::new(ChunkConfig::markdown()),
            code: RecursiveSplitter::new(ChunkConfig::code()),
            prose: RecursiveSplitter::new(ChunkConfig::prose()),
            portfolio: RecursiveSplitter::new(ChunkConfig::portfolio()),
        }
    }
}

impl Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the configuration used for one content type
    pub fn with_config(mut self, chunk_type: ChunkType, config: ChunkConfig) -> Self {
        let splitter = RecursiveSplitter::new(config);
        match chunk_type {
            ChunkType::Markdown => self.markdown = splitter,
            ChunkType::Code => self.code = splitter,
            ChunkType::Prose => self.prose = splitter,
            ChunkType::Portfolio => self.portfolio = splitter,
        }
        self
    }

    fn splitter(&self, chunk_type: ChunkType) -> &RecursiveSplitter {
        match chunk_type {
            ChunkType::Markdown => &self.markdown,
            ChunkType::Code => &self.code,
            ChunkType::Prose => &self.prose,
            ChunkType::Portfolio => &self.portfolio,
        }
    }

    /// Split `text` with the strategy for `chunk_type`, labelling every chunk with `source`
    pub fn chunk(&self, text: &str, source: &str, chunk_type: ChunkType) -> Vec<Chunk> {
        self.splitter(chunk_type)
            .split_text(text)
            .into_iter()
            .filter_map(|segment| Chunk::new(segment, source, chunk_type))
            .collect()
    }

    pub fn chunk_markdown(&self, text: &str, source: &str) -> Vec<Chunk> {
        self.chunk(text, source, ChunkType::Markdown)
    }

    pub fn chunk_code(&self, text: &str, source: &str, lang: &str) -> Vec<Chunk> {
        self.chunk(text, source, ChunkType::Code)
            .into_iter()
            .map(|c| c.with_lang(lang))
            .collect()
    }

    pub fn chunk_prose(&self, text: &str, source: &str) -> Vec<Chunk> {
        self.chunk(text, source, ChunkType::Prose)
    }

    pub fn chunk_portfolio(&self, text: &str, source: &str) -> Vec<Chunk> {
        self.chunk(text, source, ChunkType::Portfolio)
    }

    /// Pick a strategy from a file extension (with or without the dot)
    pub fn chunk_by_extension(&self, text: &str, source: &str, ext: &str) -> Vec<Chunk> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "md" | "markdown" | "rst" => self.chunk_markdown(text, source),
            "txt" | "" => self.chunk_prose(text, source),
            "json" => self.chunk_portfolio(text, source),
            _ => self.chunk_code(text, source, &ext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize, seps: &[&str]) -> RecursiveSplitter {
        RecursiveSplitter::new(ChunkConfig::new(size, overlap, seps))
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let s = splitter(100, 10, &["\n\n"]);
        assert_eq!(s.split_text("  hello world  "), vec!["hello world"]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        let chunker = Chunker::new();
        assert!(chunker.chunk_prose("   \n\n  ", "s").is_empty());
        assert!(chunker.chunk_markdown("", "s").is_empty());
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "Lorem ipsum dolor sit amet. ".repeat(100);
        let s = RecursiveSplitter::new(ChunkConfig::prose());
        let chunks = s.split_text(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 500, "chunk too long: {}", char_len(chunk));
        }
    }

    #[test]
    fn test_overlap_carries_tail() {
        let s = splitter(10, 4, &[" "]);
        let chunks = s.split_text("aa bb cc dd ee ff");
        assert!(chunks.len() >= 2);
        // Every chunk after the first starts with the last word of its predecessor
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].starts_with(last_word),
                "{:?} does not overlap {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn test_falls_back_to_characters() {
        let s = splitter(4, 0, &["\n\n"]);
        let chunks = s.split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_recurses_into_next_separator() {
        let s = splitter(12, 0, &["\n\n", " "]);
        let text = "short\n\nthis paragraph is too long";
        let chunks = s.split_text(text);
        assert_eq!(chunks[0], "short");
        assert!(chunks.iter().all(|c| char_len(c) <= 12));
        assert!(chunks.iter().any(|c| c.contains("paragraph")));
    }

    #[test]
    fn test_separator_stays_with_following_piece() {
        let pieces = split_keeping_separator("a\n## b\n## c", "\n## ");
        assert_eq!(pieces, vec!["a", "\n## b", "\n## c"]);
    }

    #[test]
    fn test_multibyte_text_is_measured_in_chars() {
        let s = splitter(3, 0, &[]);
        let chunks = s.split_text("가나다라마");
        assert_eq!(chunks, vec!["가나다", "라마"]);
    }

    #[test]
    fn test_markdown_splits_on_headings() {
        let section = "lorem ipsum ".repeat(40);
        let text = format!("# Title\n\n## Install\n{section}\n## Usage\n{section}");
        let chunks = Chunker::new().chunk_markdown(&text, "github/a/b/README.md");
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().any(|c| c.text().starts_with("## Usage")));
        assert!(chunks
            .iter()
            .all(|c| c.source() == "github/a/b/README.md" && c.chunk_type() == ChunkType::Markdown));
    }

    #[test]
    fn test_code_chunks_carry_language() {
        let chunks = Chunker::new().chunk_by_extension("def f():\n    return 1\n", "x.py", ".py");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].lang(), Some("py"));
        assert_eq!(chunks[0].chunk_type(), ChunkType::Code);
    }
}
