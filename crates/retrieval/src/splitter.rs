//! Recursive character splitter.
//!
//! A document is cut on the first separator of `["\n\n", "\n", " ", ""]` that occurs in it.
//! Separators stay attached to the start of the piece that follows them, so every piece is a
//! contiguous span of the source. Pieces shorter than `chunk_size` are greedily merged; longer
//! ones are split again with the remaining separators. Merged chunks keep up to
//! `chunk_overlap` characters of their predecessor's tail. Sizes are counted in characters.

use std::ops::Range;

use delicia_core::knowledge::SourceDocument;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A contiguous, whitespace-trimmed slice of a source document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub source: String,
    pub text: String,
    /// Byte range of `text` inside the source document.
    pub start: usize,
    pub end: usize,
}

impl KnowledgeChunk {
    fn new(source: &str, text: &str, span: Range<usize>) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(source.as_bytes());
        hasher.update(&(span.start as u64).to_le_bytes());
        hasher.update(&(span.end as u64).to_le_bytes());
        hasher.update(text.as_bytes());
        let digest = hasher.finalize().to_hex();

        Self {
            id: format!("chunk_{}", &digest[..16]),
            source: source.to_string(),
            text: text.to_string(),
            start: span.start,
            end: span.end,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RetrievalError> {
        if chunk_size == 0 {
            return Err(RetrievalError::InvalidSplitter("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RetrievalError::InvalidSplitter(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|sep| (*sep).to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_documents(&self, documents: &[SourceDocument]) -> Vec<KnowledgeChunk> {
        documents.iter().flat_map(|document| self.split_document(document)).collect()
    }

    pub fn split_document(&self, document: &SourceDocument) -> Vec<KnowledgeChunk> {
        let text = document.text.as_str();
        self.split_spans(text)
            .into_iter()
            .filter_map(|span| trimmed(text, span))
            .map(|span| KnowledgeChunk::new(&document.source, &text[span.clone()], span))
            .collect()
    }

    /// Raw (untrimmed) chunk spans in document order.
    fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.split_range(text, 0..text.len(), &self.separators)
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[String],
    ) -> Vec<Range<usize>> {
        let slice = &text[range.clone()];
        let (separator, remaining) = pick_separator(slice, separators);
        let pieces = split_keeping_separator(text, range, separator);

        let mut chunks = Vec::new();
        let mut pending = Vec::new();
        for piece in pieces {
            if char_len(text, &piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(text, &pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_range(text, piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(text, &pending));
        }

        chunks
    }

    /// Greedy merge of adjacent pieces. Pieces are contiguous, so a window of them is a span.
    fn merge(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut merged = Vec::new();
        let mut window: Vec<(Range<usize>, usize)> = Vec::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(text, piece);
            if total + len > self.chunk_size && !window.is_empty() {
                merged.push(window_span(&window));
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    let (_, dropped) = window.remove(0);
                    total -= dropped;
                }
            }
            window.push((piece.clone(), len));
            total += len;
        }
        if !window.is_empty() {
            merged.push(window_span(&window));
        }

        merged
    }
}

fn pick_separator<'a>(slice: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (position, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if slice.contains(separator.as_str()) {
            return (separator, &separators[position + 1..]);
        }
    }
    ("", &[])
}

/// Splits `range` before each occurrence of `separator`; an empty separator yields characters.
fn split_keeping_separator(text: &str, range: Range<usize>, separator: &str) -> Vec<Range<usize>> {
    let slice = &text[range.clone()];
    let offset = range.start;

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(index, ch)| offset + index..offset + index + ch.len_utf8())
            .collect();
    }

    let mut pieces = Vec::new();
    let mut piece_start = 0;
    for (index, _) in slice.match_indices(separator) {
        if index > piece_start {
            pieces.push(offset + piece_start..offset + index);
        }
        piece_start = index;
    }
    if piece_start < slice.len() {
        pieces.push(offset + piece_start..range.end);
    }
    pieces
}

fn window_span(window: &[(Range<usize>, usize)]) -> Range<usize> {
    let start = window.first().map(|(span, _)| span.start).unwrap_or(0);
    let end = window.last().map(|(span, _)| span.end).unwrap_or(start);
    start..end
}

fn trimmed(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[span.clone()];
    let without_leading = slice.trim_start();
    let start = span.start + (slice.len() - without_leading.len());
    let end = start + without_leading.trim_end().len();
    (end > start).then_some(start..end)
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}

#[cfg(test)]
mod tests {
    use delicia_core::knowledge::{restaurant_documents, SourceDocument};

    use super::RecursiveSplitter;

    fn reassemble(text: &str, chunks: &[super::KnowledgeChunk]) -> String {
        let mut cursor = 0;
        let mut rebuilt = String::new();
        for chunk in chunks {
            let from = cursor.max(chunk.start);
            if from < chunk.end {
                rebuilt.push_str(&text[from..chunk.end]);
            }
            cursor = cursor.max(chunk.end);
        }
        rebuilt
    }

    fn without_whitespace(text: &str) -> String {
        text.chars().filter(|ch| !ch.is_whitespace()).collect()
    }

    #[test]
    fn short_document_becomes_one_trimmed_chunk() {
        let splitter = RecursiveSplitter::new(500, 100).expect("splitter");
        let chunks = splitter.split_document(&SourceDocument::new("info.txt", "\n  Hola mundo \n"));

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hola mundo");
        assert_eq!(chunks[0].source, "info.txt");
        assert_eq!((chunks[0].start, chunks[0].end), (3, 13));
    }

    #[test]
    fn chunks_respect_size_and_reassemble_the_menu() {
        let splitter = RecursiveSplitter::new(120, 30).expect("splitter");

        for document in restaurant_documents() {
            let chunks = splitter.split_document(&document);
            assert!(!chunks.is_empty());

            for chunk in &chunks {
                assert!(chunk.text.chars().count() <= 120, "oversized chunk {:?}", chunk.text);
                assert_eq!(&document.text[chunk.start..chunk.end], chunk.text);
                assert_eq!(chunk.text.trim(), chunk.text);
            }
            assert!(chunks.windows(2).all(|pair| pair[0].start <= pair[1].start));
            assert_eq!(
                without_whitespace(&reassemble(&document.text, &chunks)),
                without_whitespace(&document.text)
            );
        }
    }

    #[test]
    fn neighbouring_chunks_share_an_overlap_when_words_allow_it() {
        let text = (1..=60).map(|n| format!("palabra{n:02}")).collect::<Vec<_>>().join(" ");
        let splitter = RecursiveSplitter::new(100, 30).expect("splitter");
        let chunks = splitter.split_document(&SourceDocument::new("words.txt", text.clone()));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "expected overlap between {pair:?}");
            let shared = pair[0].end - pair[1].start;
            assert!(shared <= 30, "overlap {shared} exceeds configured overlap");
        }
        assert_eq!(without_whitespace(&reassemble(&text, &chunks)), without_whitespace(&text));
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let text = "ñ".repeat(25);
        let splitter = RecursiveSplitter::new(10, 2).expect("splitter");
        let chunks = splitter.split_document(&SourceDocument::new("x.txt", text.clone()));

        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 10));
        assert_eq!(reassemble(&text, &chunks), text);
    }

    #[test]
    fn chunk_ids_are_stable_across_runs() {
        let splitter = RecursiveSplitter::new(200, 50).expect("splitter");
        let first = splitter.split_documents(&restaurant_documents());
        let second = splitter.split_documents(&restaurant_documents());

        assert_eq!(first, second);
        let mut ids = first.iter().map(|chunk| chunk.id.clone()).collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), first.len());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(RecursiveSplitter::new(100, 100).is_err());
        assert!(RecursiveSplitter::new(0, 0).is_err());
    }
}
