//! Error types for the RAG crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot has been published at this location.
    #[error("no snapshot found at {path}")]
    NotFound {
        /// Path that was expected to hold the snapshot or its pointer.
        path: PathBuf,
    },

    /// The index and metadata artifacts disagree, or one exists without the other.
    #[error("mismatched snapshot {snapshot_id}: {reason}")]
    MismatchedSnapshot {
        /// Snapshot directory name the artifacts were read from.
        snapshot_id: String,
        /// Which property disagreed.
        reason: String,
    },

    /// An artifact exists but cannot be decoded.
    #[error("corrupt snapshot artifact {path}: {reason}")]
    Corrupt {
        /// Artifact path.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// An artifact exists but the filesystem refused to read it.
    #[error("cannot read snapshot artifact {path}: {source}")]
    Unreadable {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl SnapshotError {
    /// Returns `true` when the only way forward is to rebuild the snapshot.
    ///
    /// Unreadable artifacts may recover once permissions or mounts are fixed, so they do not
    /// demand a rebuild.
    #[must_use]
    pub const fn needs_rebuild(&self) -> bool {
        !matches!(self, Self::Unreadable { .. })
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Window size is zero or the overlap does not leave a positive stride.
    #[error("invalid chunk window: size {window_size}, overlap {overlap}")]
    InvalidChunkWindow {
        /// Words per window.
        window_size: usize,
        /// Words shared by consecutive windows.
        overlap: usize,
    },

    /// Query-time embedding model differs from the one the snapshot was built with.
    #[error("embedding model mismatch: snapshot built with {expected}, query uses {actual}")]
    ModelMismatch {
        /// Identity recorded in the snapshot.
        expected: String,
        /// Identity of the configured model.
        actual: String,
    },

    /// A document lacks a required attribute.
    #[error("document {document} is missing required attribute `{attribute}`")]
    MissingAttribute {
        /// Document identifier, or the input line when the identifier itself is missing.
        document: String,
        /// Attribute name.
        attribute: String,
    },

    /// Two documents in one build share an identifier.
    #[error("duplicate document id: {0}")]
    DuplicateDocument(String),

    /// Two chunks in one build share an identifier.
    #[error("duplicate chunk id: {0}")]
    DuplicateChunk(String),

    /// `k` must be at least one.
    #[error("invalid k: {0} (must be at least 1)")]
    InvalidK(usize),

    /// The prompt context budget must be at least one character.
    #[error("invalid prompt budget: max_chars must be at least 1")]
    InvalidPromptBudget,

    /// A configuration value could not be parsed.
    #[error("invalid configuration value for {key}: `{value}`")]
    InvalidConfig {
        /// Setting or environment variable name.
        key: String,
        /// Rejected value.
        value: String,
    },

    /// Dimension mismatch between embedding and index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// Vector index operation failed.
    #[error("index error: {0}")]
    Index(String),

    /// The index has no vectors to search.
    #[error("index is empty")]
    EmptyIndex,

    /// Metadata position out of range.
    #[error("no chunk at position {position} (store holds {len})")]
    NotFound {
        /// Requested position.
        position: usize,
        /// Number of rows in the store.
        len: usize,
    },

    /// Embedding operation failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// Snapshot is missing, corrupt or inconsistent.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The generation backend failed, timed out or produced nothing.
    #[error("generation backend {backend} unavailable: {source:#}")]
    BackendUnavailable {
        /// Backend name from its profile.
        backend: String,
        /// Underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// IO operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A document record could not be parsed.
    #[error("invalid document at line {line}: {reason}")]
    Document {
        /// One-based input line.
        line: usize,
        /// Parser message.
        reason: String,
    },
}

impl RagError {
    /// Returns `true` for configuration errors, which are fatal and never retried.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidChunkWindow { .. }
                | Self::ModelMismatch { .. }
                | Self::MissingAttribute { .. }
                | Self::DuplicateDocument(_)
                | Self::DuplicateChunk(_)
                | Self::InvalidK(_)
                | Self::InvalidPromptBudget
                | Self::InvalidConfig { .. }
        )
    }

    /// Returns `true` when the error requires rebuilding the snapshot.
    #[must_use]
    pub const fn needs_rebuild(&self) -> bool {
        match self {
            Self::Snapshot(error) => error.needs_rebuild(),
            Self::ModelMismatch { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn embedding(message: impl std::fmt::Display) -> Self {
        Self::Embedding(anyhow::anyhow!("{message}"))
    }
}

/// Result type alias for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
