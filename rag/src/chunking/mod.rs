//! Text chunking for RAG.
//!
//! Documents are split into overlapping word windows. Each window becomes one [`ChunkRecord`]
//! carrying its parent's attributes, so retrieval can cite and filter at chunk granularity.

mod window;

pub use window::{WordWindowChunker, chunk_words};

use crate::error::Result;
use crate::types::{ChunkRecord, Document};

/// Trait for text chunking strategies.
pub trait Chunker: Send + Sync {
    /// Splits a document into chunks, in production order.
    ///
    /// Empty or whitespace-only documents yield no chunks.
    fn chunk(&self, doc: &Document) -> Result<Vec<ChunkRecord>>;

    /// Returns the name of this chunking strategy.
    fn name(&self) -> &'static str;
}
