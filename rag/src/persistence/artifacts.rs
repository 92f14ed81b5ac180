//! On-disk encodings of the two snapshot artifacts.

use rkyv::rancor::Error as RkyvError;
use rkyv::util::AlignedVec;
use rkyv::{from_bytes, to_bytes};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;

use crate::error::{RagError, Result, SnapshotError};
use crate::index::{FlatIndex, VectorIndex};
use crate::snapshot::BuildParams;
use crate::types::ChunkRecord;

/// File name of the vector artifact.
pub const INDEX_FILE: &str = "index.rkyv";
/// File name of the metadata artifact.
pub const META_FILE: &str = "meta.json";

/// Vector artifact, stored with rkyv.
#[derive(Debug, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub(super) struct IndexArtifact {
    pub snapshot_id: String,
    pub count: u64,
    pub dimension: u64,
    pub vectors: Vec<f32>,
}

impl IndexArtifact {
    pub fn new(snapshot_id: &str, index: &FlatIndex) -> Self {
        Self {
            snapshot_id: snapshot_id.to_string(),
            count: index.len() as u64,
            dimension: index.dimension() as u64,
            vectors: index.as_flat().to_vec(),
        }
    }

    pub fn encode(&self) -> Result<AlignedVec> {
        to_bytes::<RkyvError>(self).map_err(|e| RagError::Serialization(e.to_string()))
    }

    pub fn decode(path: &Path, bytes: &[u8]) -> Result<Self> {
        let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        from_bytes::<Self, RkyvError>(&aligned).map_err(|e| {
            SnapshotError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Metadata artifact, stored as JSON so it can be inspected by hand.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct MetaArtifact<'a> {
    pub snapshot_id: Cow<'a, str>,
    pub count: usize,
    pub dimension: usize,
    pub params: Cow<'a, BuildParams>,
    pub rows: Cow<'a, [ChunkRecord]>,
}

impl MetaArtifact<'_> {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| RagError::Serialization(e.to_string()))
    }

    pub fn decode(path: &Path, bytes: &[u8]) -> Result<MetaArtifact<'static>> {
        serde_json::from_slice(bytes).map_err(|e| {
            SnapshotError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}
