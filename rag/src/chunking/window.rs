//! Overlapping word-window chunking.

use crate::error::{RagError, Result};
use crate::types::{ChunkRecord, Document};

use super::Chunker;

/// Splits `text` on whitespace into windows of `window_size` words sharing `overlap` words.
///
/// Windows start at word 0 and advance by `window_size - overlap`. The last window ends exactly
/// at the final word and is the only one that may be shorter. Empty text yields no windows.
///
/// # Errors
///
/// Returns [`RagError::InvalidChunkWindow`] when `window_size` is zero or `overlap` is not
/// smaller than `window_size`.
///
/// # Example
///
/// ```rust
/// use plaint_rag::chunking::chunk_words;
///
/// let chunks = chunk_words("a b c d e", 3, 1).unwrap();
/// assert_eq!(chunks, vec!["a b c", "c d e"]);
/// ```
pub fn chunk_words(text: &str, window_size: usize, overlap: usize) -> Result<Vec<String>> {
    let stride = stride(window_size, overlap)?;
    let words: Vec<&str> = text.split_whitespace().collect();

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + window_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    Ok(chunks)
}

fn stride(window_size: usize, overlap: usize) -> Result<usize> {
    match window_size.checked_sub(overlap) {
        Some(stride) if window_size > 0 && stride > 0 => Ok(stride),
        _ => Err(RagError::InvalidChunkWindow {
            window_size,
            overlap,
        }),
    }
}

/// Chunks documents into fixed-size word windows with overlap.
///
/// ```rust
/// use plaint_rag::chunking::{Chunker, WordWindowChunker};
/// use plaint_rag::Document;
///
/// let chunker = WordWindowChunker::new(400, 60).unwrap();
/// let doc = Document::new("1001", "Credit card", "I was charged twice for one purchase");
/// let chunks = chunker.chunk(&doc).unwrap();
/// assert_eq!(chunks[0].chunk_id, "1001_0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordWindowChunker {
    window_size: usize,
    overlap: usize,
}

impl WordWindowChunker {
    /// Creates a chunker, validating the window parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidChunkWindow`] if the stride would not be positive.
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        stride(window_size, overlap)?;
        Ok(Self {
            window_size,
            overlap,
        })
    }

    /// Words per window.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Words shared by consecutive windows.
    #[must_use]
    pub const fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Chunker for WordWindowChunker {
    fn chunk(&self, doc: &Document) -> Result<Vec<ChunkRecord>> {
        Ok(chunk_words(&doc.text, self.window_size, self.overlap)?
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| ChunkRecord::from_document(doc, ordinal, text))
            .collect())
    }

    fn name(&self) -> &'static str {
        "word_window"
    }
}
