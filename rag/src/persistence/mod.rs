//! Versioned snapshot storage.
//!
//! ```text
//! <root>/
//!   CURRENT                    id of the published snapshot
//!   snapshots/<id>/index.rkyv  vectors (rkyv)
//!   snapshots/<id>/meta.json   build parameters and ordered chunk rows
//! ```
//!
//! Publishing writes both artifacts into a staging directory, renames it into place and then
//! replaces `CURRENT` atomically. A failed build leaves the previous snapshot published.

mod artifacts;

pub use artifacts::{INDEX_FILE, META_FILE};

use artifacts::{IndexArtifact, MetaArtifact};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, warn};

use crate::error::{RagError, Result, SnapshotError};
use crate::index::{FlatIndex, VectorIndex};
use crate::metadata::MetadataStore;
use crate::snapshot::BuildSnapshot;

/// Name of the pointer file.
pub const CURRENT_FILE: &str = "CURRENT";
const SNAPSHOTS_DIR: &str = "snapshots";

/// Filesystem store for build snapshots.
#[derive(Debug)]
pub struct SnapshotStore {
    root: PathBuf,
    publish_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Opens a store rooted at `root`. Nothing is created until the first publish.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            publish_lock: Mutex::new(()),
        }
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of snapshot `id`.
    #[must_use]
    pub fn snapshot_dir(&self, id: &str) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR).join(id)
    }

    /// Persists `snapshot` and makes it the current one.
    ///
    /// Publishing a snapshot whose directory already exists (an identical rebuild) only moves
    /// the pointer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] or [`RagError::Serialization`] if writing fails; the pointer is
    /// left unchanged in that case.
    pub fn publish(&self, snapshot: &BuildSnapshot) -> Result<PathBuf> {
        let _guard = self.publish_lock.lock();
        let snapshots = self.root.join(SNAPSHOTS_DIR);
        fs::create_dir_all(&snapshots)?;

        let target = self.snapshot_dir(snapshot.id());
        if target.is_dir() {
            info!(snapshot = snapshot.id(), "snapshot already stored, reusing it");
        } else {
            let staging = Builder::new().prefix(".staging-").tempdir_in(&snapshots)?;
            write_artifacts(staging.path(), snapshot)?;
            if let Err(error) = fs::rename(staging.path(), &target) {
                if !target.is_dir() {
                    return Err(error.into());
                }
                warn!(snapshot = snapshot.id(), "snapshot appeared while staging, keeping existing copy");
            }
            debug!(path = %target.display(), "snapshot directory in place");
        }

        let mut pointer = NamedTempFile::new_in(&self.root)?;
        pointer.write_all(snapshot.id().as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer
            .persist(self.root.join(CURRENT_FILE))
            .map_err(|e| RagError::Io(e.error))?;

        info!(snapshot = snapshot.id(), chunks = snapshot.len(), "published snapshot");
        Ok(target)
    }

    /// Identifier named by `CURRENT`, if any snapshot was ever published.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Unreadable`] if the pointer exists but cannot be read.
    pub fn current_id(&self) -> Result<Option<String>> {
        let path = self.root.join(CURRENT_FILE);
        match fs::read_to_string(&path) {
            Ok(id) => Ok(Some(id.trim().to_string()).filter(|id| !id.is_empty())),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SnapshotError::Unreadable { path, source }.into()),
        }
    }

    /// Loads the published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] if nothing was published, or any error of
    /// [`load`](Self::load).
    pub fn load_current(&self) -> Result<BuildSnapshot> {
        let id = self.current_id()?.ok_or_else(|| SnapshotError::NotFound {
            path: self.root.join(CURRENT_FILE),
        })?;
        self.load(&id)
    }

    /// Loads snapshot `id`, verifying that both artifacts agree and the content matches the id.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::NotFound`] if neither artifact exists
    /// - [`SnapshotError::MismatchedSnapshot`] if only one exists or they disagree
    /// - [`SnapshotError::Corrupt`] if an artifact cannot be decoded or the content fingerprint
    ///   differs from `id`
    pub fn load(&self, id: &str) -> Result<BuildSnapshot> {
        let dir = self.snapshot_dir(id);
        let index_path = dir.join(INDEX_FILE);
        let meta_path = dir.join(META_FILE);
        let mismatch = |reason: String| -> RagError {
            SnapshotError::MismatchedSnapshot {
                snapshot_id: id.to_string(),
                reason,
            }
            .into()
        };

        match (index_path.is_file(), meta_path.is_file()) {
            (false, false) => return Err(SnapshotError::NotFound { path: dir }.into()),
            (true, false) => return Err(mismatch(format!("{META_FILE} is missing"))),
            (false, true) => return Err(mismatch(format!("{INDEX_FILE} is missing"))),
            (true, true) => {}
        }

        let index = IndexArtifact::decode(&index_path, &read(&index_path)?)?;
        let meta = MetaArtifact::decode(&meta_path, &read(&meta_path)?)?;

        if index.snapshot_id != id || meta.snapshot_id != id {
            return Err(mismatch(format!(
                "artifacts name snapshots {} and {}",
                index.snapshot_id, meta.snapshot_id
            )));
        }
        let (count, dimension) = (index.count as usize, index.dimension as usize);
        if count != meta.count || dimension != meta.dimension {
            return Err(mismatch(format!(
                "index has {count} x {dimension}, metadata has {} x {}",
                meta.count, meta.dimension
            )));
        }
        if meta.rows.len() != count || index.vectors.len() != count * dimension {
            return Err(SnapshotError::Corrupt {
                path: dir,
                reason: "artifact payload does not match its declared size".into(),
            }
            .into());
        }

        let params = meta.params.into_owned();
        let flat = FlatIndex::from_flat(dimension, index.vectors)?;
        let snapshot = BuildSnapshot::new(params, flat, meta.rows.into_owned())?;
        if snapshot.id() != id {
            return Err(SnapshotError::Corrupt {
                path: dir,
                reason: format!("content fingerprint {} does not match", snapshot.id()),
            }
            .into());
        }

        info!(snapshot = id, chunks = snapshot.len(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Identifiers of every stored snapshot, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the snapshot directory cannot be listed.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.root.join(SNAPSHOTS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && !name.starts_with('.') {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| {
        SnapshotError::Unreadable {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn write_artifacts(dir: &Path, snapshot: &BuildSnapshot) -> Result<()> {
    let index = IndexArtifact::new(snapshot.id(), snapshot.index()).encode()?;
    write_synced(&dir.join(INDEX_FILE), &index)?;

    let metadata: &MetadataStore = snapshot.metadata();
    let meta = MetaArtifact {
        snapshot_id: Cow::Borrowed(snapshot.id()),
        count: metadata.len(),
        dimension: snapshot.index().dimension(),
        params: Cow::Borrowed(snapshot.params()),
        rows: Cow::Borrowed(metadata.rows()),
    }
    .encode()?;
    write_synced(&dir.join(META_FILE), &meta)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
