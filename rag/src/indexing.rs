//! Batch snapshot builds with progress reporting.

use plaint_core::EmbeddingModel;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::chunking::{Chunker, WordWindowChunker};
use crate::documents::load_documents;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::FlatIndex;
use crate::persistence::SnapshotStore;
use crate::snapshot::{BuildParams, BuildSnapshot, SnapshotHandle};
use crate::types::{ChunkRecord, Document};

/// Progress update during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProgress {
    /// Current stage.
    pub stage: BuildStage,
    /// Time since the build started.
    pub elapsed: Duration,
}

/// Stages of a build, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStage {
    /// Documents were read from disk.
    Loading {
        /// Documents read.
        documents: usize,
    },
    /// Documents were split into chunks.
    Chunking {
        /// Documents that produced at least one chunk.
        documents: usize,
        /// Chunks produced.
        chunks: usize,
    },
    /// One embedding batch finished.
    Embedding {
        /// Batches done so far.
        batch: usize,
        /// Total batches.
        batches: usize,
    },
    /// Building the vector index.
    Indexing,
    /// Writing the snapshot to the store.
    Persisting,
    /// The snapshot is published.
    Done {
        /// Identifier of the published snapshot.
        snapshot_id: String,
        /// Chunks in the snapshot.
        chunks: usize,
    },
}

/// Builds snapshots from documents and publishes them to a [`SnapshotStore`].
///
/// Builds in one process run one at a time. A failed build publishes nothing and leaves the
/// previous snapshot current.
#[derive(Debug)]
pub struct SnapshotBuilder<M> {
    embedder: Arc<Embedder<M>>,
    chunker: WordWindowChunker,
    store: SnapshotStore,
    building: async_lock::Mutex<()>,
}

impl<M: EmbeddingModel> SnapshotBuilder<M> {
    /// Creates a builder.
    pub fn new(embedder: Arc<Embedder<M>>, chunker: WordWindowChunker, store: SnapshotStore) -> Self {
        Self {
            embedder,
            chunker,
            store,
            building: async_lock::Mutex::new(()),
        }
    }

    /// The store snapshots are published to.
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// The chunker.
    pub const fn chunker(&self) -> &WordWindowChunker {
        &self.chunker
    }

    /// The embedder.
    pub const fn embedder(&self) -> &Arc<Embedder<M>> {
        &self.embedder
    }

    /// Builds and publishes a snapshot of `documents`.
    ///
    /// # Errors
    ///
    /// See [`build_with_progress`](Self::build_with_progress).
    pub async fn build(&self, documents: &[Document]) -> Result<BuildSnapshot> {
        self.build_with_progress(documents, |_| {}).await
    }

    /// Loads a JSON Lines file, then builds and publishes a snapshot of it.
    ///
    /// # Errors
    ///
    /// Propagates loading errors and those of
    /// [`build_with_progress`](Self::build_with_progress).
    pub async fn build_from_path(
        &self,
        path: impl AsRef<Path>,
        mut on_progress: impl FnMut(BuildProgress) + Send,
    ) -> Result<BuildSnapshot> {
        let started = Instant::now();
        let documents = load_documents(path)?;
        on_progress(BuildProgress {
            stage: BuildStage::Loading {
                documents: documents.len(),
            },
            elapsed: started.elapsed(),
        });
        self.build_with_progress(&documents, on_progress).await
    }

    /// Builds, persists and publishes a snapshot, reporting each stage to `on_progress`.
    ///
    /// # Errors
    ///
    /// - [`RagError::DuplicateDocument`] if two documents share an id
    /// - [`RagError::DuplicateChunk`] if two chunks share an id
    /// - [`RagError::EmptyIndex`] if no document produced a chunk
    /// - embedding and persistence errors
    pub async fn build_with_progress(
        &self,
        documents: &[Document],
        mut on_progress: impl FnMut(BuildProgress) + Send,
    ) -> Result<BuildSnapshot> {
        let _building = self.building.lock().await;
        let started = Instant::now();
        let mut report = |stage: BuildStage| {
            on_progress(BuildProgress {
                stage,
                elapsed: started.elapsed(),
            });
        };

        let rows = self.chunk(documents)?;
        let chunked_documents = rows.iter().filter(|row| row.ordinal == 0).count();
        info!(
            documents = documents.len(),
            chunked = chunked_documents,
            chunks = rows.len(),
            window = self.chunker.window_size(),
            overlap = self.chunker.overlap(),
            "chunked documents"
        );
        report(BuildStage::Chunking {
            documents: chunked_documents,
            chunks: rows.len(),
        });

        let texts: Vec<String> = rows.iter().map(|row| row.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_with_progress(&texts, |batch, batches| {
                report(BuildStage::Embedding { batch, batches });
            })
            .await?;
        info!(vectors = vectors.len(), model = self.embedder.model_id(), "embedded chunks");

        report(BuildStage::Indexing);
        let dimension = self.embedder.dimension();
        let index = FlatIndex::build(dimension, vectors)?;
        let params = BuildParams {
            chunk_size: self.chunker.window_size(),
            chunk_overlap: self.chunker.overlap(),
            model_id: self.embedder.model_id().to_string(),
            dimension,
        };
        let snapshot = BuildSnapshot::new(params, index, rows)?;

        report(BuildStage::Persisting);
        let path = self.store.publish(&snapshot)?;
        info!(
            snapshot = snapshot.id(),
            chunks = snapshot.len(),
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis(),
            "build finished"
        );
        report(BuildStage::Done {
            snapshot_id: snapshot.id().to_string(),
            chunks: snapshot.len(),
        });
        Ok(snapshot)
    }

    /// Builds a snapshot and swaps it into `handle`, returning the snapshot now served.
    ///
    /// # Errors
    ///
    /// See [`build`](Self::build). On error `handle` keeps serving its current snapshot.
    pub async fn rebuild(
        &self,
        handle: &SnapshotHandle,
        documents: &[Document],
    ) -> Result<Arc<BuildSnapshot>> {
        let snapshot = self.build(documents).await?;
        handle.publish(snapshot);
        Ok(handle.load())
    }

    fn chunk(&self, documents: &[Document]) -> Result<Vec<ChunkRecord>> {
        let mut document_ids = HashSet::with_capacity(documents.len());
        for document in documents {
            if !document_ids.insert(document.id.as_str()) {
                return Err(RagError::DuplicateDocument(document.id.clone()));
            }
        }

        let mut rows = Vec::new();
        let mut chunk_ids = HashSet::new();
        for document in documents {
            let chunks = self.chunker.chunk(document)?;
            if chunks.is_empty() {
                warn!(document = %document.id, "document produced no chunks, skipping");
                continue;
            }
            for chunk in chunks {
                if !chunk_ids.insert(chunk.chunk_id.clone()) {
                    return Err(RagError::DuplicateChunk(chunk.chunk_id));
                }
                rows.push(chunk);
            }
        }

        if rows.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        Ok(rows)
    }
}
