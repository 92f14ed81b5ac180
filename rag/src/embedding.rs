//! Embedding front-end shared by builds and queries.
//!
//! [`Embedder`] wraps any [`EmbeddingModel`] and guarantees what the index relies on: outputs
//! have the model's dimension, are finite, and have unit L2 norm. [`HashEmbedder`] is a
//! deterministic, self-contained model for offline builds.

use plaint_core::EmbeddingModel;
use rayon::prelude::*;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{RagError, Result};
use crate::snapshot::BuildParams;

/// Tolerance used when checking that a vector has unit norm.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// Normalizes `vector` to unit L2 norm after validating its shape.
///
/// # Errors
///
/// Returns [`RagError::Embedding`] for a wrong length, a non-finite component or a zero vector.
pub fn normalize(mut vector: Vec<f32>, dimension: usize) -> Result<Vec<f32>> {
    if vector.len() != dimension {
        return Err(RagError::embedding(format_args!(
            "model returned {} values, expected {dimension}",
            vector.len()
        )));
    }
    if vector.iter().any(|value| !value.is_finite()) {
        return Err(RagError::embedding("model returned a non-finite value"));
    }
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(RagError::embedding("model returned a zero vector"));
    }
    for value in &mut vector {
        *value /= norm;
    }
    Ok(vector)
}

/// Embeds texts with a model, in batches, producing unit vectors.
#[derive(Debug)]
pub struct Embedder<M> {
    model: M,
    batch_size: usize,
}

impl<M: EmbeddingModel> Embedder<M> {
    /// Default number of texts sent to the model per call.
    pub const DEFAULT_BATCH_SIZE: usize = 64;

    /// Wraps a model with the default batch size.
    pub const fn new(model: M) -> Self {
        Self {
            model,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the batch size. Zero is treated as one.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns the wrapped model.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// Model identity recorded in snapshots.
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Output dimension.
    pub fn dimension(&self) -> usize {
        self.model.dim()
    }

    /// Checks that this embedder produces vectors comparable with the snapshot's.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelMismatch`] if the identity or dimension differ.
    pub fn ensure_compatible(&self, params: &BuildParams) -> Result<()> {
        if self.model_id() != params.model_id || self.dimension() != params.dimension {
            return Err(RagError::ModelMismatch {
                expected: format!("{} (dim {})", params.model_id, params.dimension),
                actual: format!("{} (dim {})", self.model_id(), self.dimension()),
            });
        }
        Ok(())
    }

    /// Embeds one text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the model fails or returns an invalid vector.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.model.embed(text).await.map_err(RagError::Embedding)?;
        normalize(vector, self.dimension())
    }

    /// Embeds texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if any batch fails.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_progress(texts, |_, _| {}).await
    }

    /// Embeds texts, calling `on_batch(done, total)` after each batch.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if any batch fails.
    pub async fn embed_with_progress(
        &self,
        texts: &[String],
        mut on_batch: impl FnMut(usize, usize) + Send,
    ) -> Result<Vec<Vec<f32>>> {
        let dimension = self.dimension();
        let total = texts.len().div_ceil(self.batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (done, batch) in texts.chunks(self.batch_size).enumerate() {
            let raw = self
                .model
                .embed_batch(batch)
                .await
                .map_err(RagError::Embedding)?;
            if raw.len() != batch.len() {
                return Err(RagError::embedding(format_args!(
                    "model returned {} vectors for a batch of {}",
                    raw.len(),
                    batch.len()
                )));
            }
            let normalized = raw
                .into_par_iter()
                .map(|vector| normalize(vector, dimension))
                .collect::<Result<Vec<_>>>()?;
            vectors.extend(normalized);
            debug!(batch = done + 1, total, "embedded batch");
            on_batch(done + 1, total);
        }

        Ok(vectors)
    }
}

/// Deterministic feature-hashing embedding model.
///
/// Lowercased alphanumeric word unigrams and bigrams are hashed with xxh3 into `dim` signed
/// buckets. Texts sharing vocabulary land close together, which is enough for offline builds
/// and tests. Identity is `hash:<dim>`.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    id: String,
}

impl HashEmbedder {
    /// Identity prefix that selects this model.
    pub const PREFIX: &'static str = "hash:";

    /// Creates a hashing model with `dimension` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] when `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::InvalidConfig {
                key: "embedding_model".into(),
                value: format!("{}0", Self::PREFIX),
            });
        }
        Ok(Self {
            dimension,
            id: format!("{}{dimension}", Self::PREFIX),
        })
    }

    /// Parses a `hash:<dim>` identity. Returns `None` for other identities.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if the dimension is not a positive integer.
    pub fn from_model_id(model_id: &str) -> Option<Result<Self>> {
        let dimension = model_id.strip_prefix(Self::PREFIX)?;
        Some(
            dimension
                .parse::<usize>()
                .map_err(|_| RagError::InvalidConfig {
                    key: "embedding_model".into(),
                    value: model_id.to_string(),
                })
                .and_then(Self::new),
        )
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = xxh3_64(feature);
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        let tokens = Self::tokens(text);
        for token in &tokens {
            self.add(&mut vector, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            self.add(&mut vector, format!("{} {}", pair[0], pair[1]).as_bytes(), 0.5);
        }
        if vector.iter().all(|value| *value == 0.0) {
            // Empty or fully cancelled input still maps to a fixed unit direction.
            self.add(&mut vector, b"", 1.0);
        }
        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= norm;
        }
        vector
    }
}

impl EmbeddingModel for HashEmbedder {
    fn dim(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    async fn embed(&self, text: &str) -> plaint_core::Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> plaint_core::Result<Vec<Vec<f32>>> {
        Ok(texts.par_iter().map(|text| self.vectorize(text)).collect())
    }
}
