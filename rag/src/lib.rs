//! Snapshot-based retrieval-augmented question answering over complaint narratives.
//!
//! A build turns documents into a [`BuildSnapshot`]: overlapping word-window chunks, their unit
//! embeddings in an exact [`FlatIndex`], and the aligned metadata rows. Snapshots are persisted
//! atomically by a [`SnapshotStore`] and served through a [`SnapshotHandle`], so queries always
//! read an index and its metadata from the same build.
//!
//! ```text
//! documents ─▶ chunking ─▶ Embedder ─▶ FlatIndex + MetadataStore ─▶ BuildSnapshot ─▶ SnapshotStore
//!
//! question ─▶ Embedder ─▶ Retriever ─▶ PromptAssembler ─▶ Generator ─▶ Composer ─▶ Answer
//! ```
//!
//! | Stage | Type | Notes |
//! |-------|------|-------|
//! | Chunking | [`WordWindowChunker`] | fixed windows, fixed overlap |
//! | Embedding | [`Embedder`] | batched, validated, L2-normalized |
//! | Index | [`FlatIndex`] | exact inner product, parallel scoring |
//! | Retrieval | [`Retriever`] | filtered queries re-score the selected subset exactly |
//! | Prompt | [`PromptAssembler`] | character budget, whole citation headers |
//! | Generation | [`Generator`] | deadline and retry policy for any backend |
//! | Answer | [`Composer`] | trimmed answer plus display sources |
//!
//! ## Example
//!
//! ```rust,no_run
//! use plaint_rag::{
//!     Composer, Embedder, Filter, Generator, HashEmbedder, PromptAssembler, Retriever,
//!     SnapshotBuilder, SnapshotHandle, SnapshotStore, WordWindowChunker,
//! };
//! use plaint_core::LanguageModel;
//! use std::sync::Arc;
//!
//! async fn ask(model: impl LanguageModel) -> plaint_rag::Result<String> {
//!     let embedder = Arc::new(Embedder::new(HashEmbedder::new(384)?));
//!     let builder = SnapshotBuilder::new(
//!         Arc::clone(&embedder),
//!         WordWindowChunker::new(400, 60)?,
//!         SnapshotStore::new("./vector_store"),
//!     );
//!     let snapshot = builder.build_from_path("complaints.jsonl", |_| {}).await?;
//!
//!     let retriever = Retriever::new(embedder, Arc::new(SnapshotHandle::new(snapshot)));
//!     let composer = Composer::new(retriever, PromptAssembler::new(8192)?, Generator::new(model));
//!     let filter = Filter::new().category_in(["Credit card"]);
//!     let answer = composer
//!         .answer_question("Why are customers disputing fees?", Some(&filter), 5)
//!         .await?;
//!     Ok(answer.answer)
//! }
//! ```

pub mod answer;
pub mod chunking;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod filter;
mod fingerprint;
pub mod generation;
pub mod index;
pub mod indexing;
pub mod metadata;
pub mod persistence;
pub mod prompt;
pub mod retriever;
pub mod snapshot;
pub mod types;

pub use answer::{Answer, Composer, SYSTEM_MESSAGE, Source};
pub use chunking::{Chunker, WordWindowChunker, chunk_words};
pub use config::{BackendKind, GenerationSettings, RagConfig, RagConfigBuilder};
pub use documents::{load_documents, parse_documents};
pub use embedding::{Embedder, HashEmbedder};
pub use error::{RagError, Result, SnapshotError};
pub use filter::{ChunkFilter, Filter};
pub use generation::Generator;
pub use index::{FlatIndex, SubsetIndex, VectorIndex};
pub use indexing::{BuildProgress, BuildStage, SnapshotBuilder};
pub use metadata::MetadataStore;
pub use persistence::SnapshotStore;
pub use prompt::{CitationField, Prompt, PromptAssembler};
pub use retriever::{FilteredScoring, Retriever};
pub use snapshot::{BuildParams, BuildSnapshot, SnapshotHandle};
pub use types::{Attributes, ChunkRecord, Document, RetrievalHit};
