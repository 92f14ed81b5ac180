//! Build snapshots: an index and its metadata rows as one versioned unit.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{RagError, Result, SnapshotError};
use crate::filter::ChunkFilter;
use crate::fingerprint::Fingerprint;
use crate::index::{FlatIndex, SubsetIndex, VectorIndex};
use crate::metadata::MetadataStore;
use crate::types::{ChunkRecord, RetrievalHit};

/// Parameters a snapshot was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParams {
    /// Words per chunk window.
    pub chunk_size: usize,
    /// Words shared by consecutive windows.
    pub chunk_overlap: usize,
    /// Embedding model identity.
    pub model_id: String,
    /// Embedding dimension.
    pub dimension: usize,
}

/// An immutable index with its aligned metadata rows.
///
/// Position `i` of the index and row `i` of the metadata always describe the same chunk. The
/// two halves are only ever constructed and handed out together.
#[derive(Debug, Clone)]
pub struct BuildSnapshot {
    id: String,
    params: BuildParams,
    index: FlatIndex,
    metadata: MetadataStore,
}

impl BuildSnapshot {
    /// Assembles a snapshot and derives its identifier from the content.
    ///
    /// The identifier is a fingerprint of the parameters, rows and vectors, so rebuilding
    /// identical input with a deterministic model yields the same identifier.
    ///
    /// # Errors
    ///
    /// Fails if the index and rows disagree in length or the index dimension differs from
    /// `params.dimension`.
    pub fn new(params: BuildParams, index: FlatIndex, rows: Vec<ChunkRecord>) -> Result<Self> {
        let metadata = MetadataStore::new(rows);
        let id = fingerprint(&params, &index, &metadata)?;
        Self::from_parts(id, params, index, metadata)
    }

    /// Reassembles a snapshot from persisted parts, checking alignment.
    pub(crate) fn from_parts(
        id: String,
        params: BuildParams,
        index: FlatIndex,
        metadata: MetadataStore,
    ) -> Result<Self> {
        let mismatch = |reason: String| SnapshotError::MismatchedSnapshot {
            snapshot_id: id.clone(),
            reason,
        };
        if index.dimension() != params.dimension {
            return Err(mismatch(format!(
                "index dimension {} but parameters say {}",
                index.dimension(),
                params.dimension
            ))
            .into());
        }
        if index.len() != metadata.len() {
            return Err(mismatch(format!(
                "index holds {} vectors but metadata holds {} rows",
                index.len(),
                metadata.len()
            ))
            .into());
        }
        Ok(Self {
            id,
            params,
            index,
            metadata,
        })
    }

    /// Content-derived identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Build parameters.
    #[must_use]
    pub const fn params(&self) -> &BuildParams {
        &self.params
    }

    /// The vector index.
    #[must_use]
    pub const fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// The metadata rows.
    #[must_use]
    pub const fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Returns `true` if the snapshot holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Positions of the chunks matching `filter`, ascending.
    pub fn select(&self, filter: &dyn ChunkFilter) -> Vec<usize> {
        self.metadata.positions_where(|row| filter.matches(row))
    }

    /// Materializes the subset at `positions` using the retained vectors.
    ///
    /// # Errors
    ///
    /// Fails for out-of-range or unsorted positions.
    pub fn subset(&self, positions: Vec<usize>) -> Result<SubsetIndex> {
        SubsetIndex::from_parent(&self.index, positions)
    }

    /// Turns ranked `(score, position)` pairs into hits with one-based ranks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] for a position without a row.
    pub fn hits(&self, ranked: &[(f32, usize)]) -> Result<Vec<RetrievalHit>> {
        ranked
            .iter()
            .enumerate()
            .map(|(i, &(score, position))| {
                Ok(RetrievalHit {
                    rank: i + 1,
                    score,
                    position,
                    record: self.metadata.get(position)?.clone(),
                })
            })
            .collect()
    }
}

fn fingerprint(params: &BuildParams, index: &FlatIndex, metadata: &MetadataStore) -> Result<String> {
    let mut hasher = Fingerprint::new();
    hasher
        .bytes(&serde_json::to_vec(params).map_err(|e| RagError::Serialization(e.to_string()))?)
        .bytes(
            &serde_json::to_vec(metadata.rows())
                .map_err(|e| RagError::Serialization(e.to_string()))?,
        )
        .vector(index.as_flat());
    Ok(hasher.hex())
}

/// Shared pointer to the currently published snapshot.
///
/// Queries clone the inner [`Arc`] and keep using it for their whole lifetime; publishing swaps
/// the pointer and never touches a snapshot a query may still hold.
#[derive(Debug)]
pub struct SnapshotHandle {
    current: RwLock<Arc<BuildSnapshot>>,
}

impl SnapshotHandle {
    /// Creates a handle serving `snapshot`.
    #[must_use]
    pub fn new(snapshot: BuildSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Returns the snapshot queries should read.
    #[must_use]
    pub fn load(&self) -> Arc<BuildSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Publishes `snapshot`, returning the one it replaced.
    pub fn publish(&self, snapshot: BuildSnapshot) -> Arc<BuildSnapshot> {
        let snapshot = Arc::new(snapshot);
        info!(snapshot = snapshot.id(), chunks = snapshot.len(), "serving snapshot");
        std::mem::replace(&mut *self.current.write(), snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::types::Document;

    pub(crate) fn params(dimension: usize) -> BuildParams {
        BuildParams {
            chunk_size: 400,
            chunk_overlap: 60,
            model_id: format!("hash:{dimension}"),
            dimension,
        }
    }

    fn rows() -> Vec<ChunkRecord> {
        let x = Document::new("A", "X", "");
        let y = Document::new("B", "Y", "");
        vec![
            ChunkRecord::from_document(&x, 0, "a0".into()),
            ChunkRecord::from_document(&y, 0, "b0".into()),
            ChunkRecord::from_document(&x, 1, "a1".into()),
        ]
    }

    fn snapshot() -> BuildSnapshot {
        let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]]).unwrap();
        BuildSnapshot::new(params(2), index, rows()).unwrap()
    }

    #[test]
    fn id_is_content_derived() {
        assert_eq!(snapshot().id(), snapshot().id());

        let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.8, 0.6]]).unwrap();
        let other = BuildSnapshot::new(params(2), index, rows()).unwrap();
        assert_ne!(snapshot().id(), other.id());
    }

    #[test]
    fn rejects_misaligned_parts() {
        let index = FlatIndex::build(2, vec![vec![1.0, 0.0]]).unwrap();
        assert!(matches!(
            BuildSnapshot::new(params(2), index.clone(), rows()),
            Err(RagError::Snapshot(SnapshotError::MismatchedSnapshot { .. }))
        ));
        assert!(BuildSnapshot::new(params(3), index, rows()[..1].to_vec()).is_err());
    }

    #[test]
    fn select_and_hits_stay_aligned() {
        let snapshot = snapshot();
        let positions = snapshot.select(&Filter::new().category_in(["X"]));
        assert_eq!(positions, vec![0, 2]);

        let subset = snapshot.subset(positions).unwrap();
        let ranked = subset.search(&[0.0, 1.0], 2).unwrap();
        let hits = snapshot.hits(&ranked).unwrap();
        assert_eq!(hits[0].record.chunk_id, "A_1");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].record.chunk_id, "A_0");
        assert_eq!(hits[1].rank, 2);
    }

    #[test]
    fn publish_swaps_without_touching_readers() {
        let handle = SnapshotHandle::new(snapshot());
        let reader = handle.load();

        let index = FlatIndex::build(2, vec![vec![1.0, 0.0]]).unwrap();
        let next = BuildSnapshot::new(params(2), index, rows()[..1].to_vec()).unwrap();
        let previous = handle.publish(next);

        assert_eq!(previous.id(), reader.id());
        assert_eq!(reader.len(), 3);
        assert_eq!(handle.load().len(), 1);
    }
}
