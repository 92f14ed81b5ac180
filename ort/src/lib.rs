//! Local ONNX Runtime sentence embeddings for plaint.
//!
//! [`OrtEmbedding`] implements [`plaint_core::EmbeddingModel`] for sentence-transformers models
//! exported to ONNX, such as `all-MiniLM-L6-v2`. Texts are tokenized, padded per batch, run
//! through the session and pooled into one vector each.
//!
//! # Features
//!
//! - `runtime`: links ONNX Runtime and the tokenizer. Without it every build fails with
//!   [`OrtError::RuntimeDisabled`], which lets the rest of the workspace compile offline.
//! - `cuda` / `coreml`: hardware execution providers.
//!
//! The model identity reported to the retrieval layer is the directory (or model file) path, so a
//! snapshot built with one model directory refuses queries from another.
//!
//! ```rust,no_run
//! use plaint_ort::OrtEmbedding;
//! use plaint_core::EmbeddingModel;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let embedder = OrtEmbedding::from_directory("./models/all-MiniLM-L6-v2")?;
//! let embedding = embedder.embed("I was charged a late fee twice").await?;
//! assert_eq!(embedding.len(), embedder.dim());
//! # Ok(())
//! # }
//! ```

mod error;
mod pooling;
#[cfg(feature = "runtime")]
mod runtime;

pub use error::OrtError;
pub use pooling::PoolingStrategy;

use plaint_core::EmbeddingModel;
use std::path::{Path, PathBuf};
use tracing::info;

/// An embedding model backed by ONNX Runtime.
pub struct OrtEmbedding {
    model_id: String,
    dimension: usize,
    pooling: PoolingStrategy,
    #[cfg(feature = "runtime")]
    runtime: runtime::Runtime,
}

impl std::fmt::Debug for OrtEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEmbedding")
            .field("model_id", &self.model_id)
            .field("dimension", &self.dimension)
            .field("pooling", &self.pooling)
            .finish_non_exhaustive()
    }
}

impl OrtEmbedding {
    /// Loads a model directory containing an `.onnx` model and `tokenizer.json`.
    ///
    /// The directory path becomes the model identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the model or tokenizer cannot be found or loaded.
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, OrtError> {
        let dir = path.as_ref();
        Self::builder()
            .model_path(find_model_file(dir)?)
            .tokenizer_path(find_tokenizer_file(dir)?)
            .model_id(dir.display().to_string())
            .build()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> OrtEmbeddingBuilder {
        OrtEmbeddingBuilder::default()
    }

    /// Returns the embedding dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the pooling strategy.
    #[must_use]
    pub const fn pooling(&self) -> PoolingStrategy {
        self.pooling
    }

    #[cfg(feature = "runtime")]
    fn run(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OrtError> {
        let mut vectors = self.runtime.embed(texts, self.pooling)?;
        for vector in &mut vectors {
            l2_normalize(vector);
        }
        Ok(vectors)
    }

    #[cfg(not(feature = "runtime"))]
    #[allow(clippy::unused_self)]
    fn run(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, OrtError> {
        Err(OrtError::RuntimeDisabled)
    }
}

impl EmbeddingModel for OrtEmbedding {
    fn dim(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, text: &str) -> plaint_core::Result<Vec<f32>> {
        let mut vectors = self.run(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| OrtError::InvalidOutputShape(0).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> plaint_core::Result<Vec<Vec<f32>>> {
        Ok(self.run(texts)?)
    }
}

/// Builder for [`OrtEmbedding`].
#[derive(Debug)]
pub struct OrtEmbeddingBuilder {
    model_path: Option<PathBuf>,
    tokenizer_path: Option<PathBuf>,
    model_id: Option<String>,
    pooling: PoolingStrategy,
    max_length: usize,
}

impl Default for OrtEmbeddingBuilder {
    fn default() -> Self {
        Self {
            model_path: None,
            tokenizer_path: None,
            model_id: None,
            pooling: PoolingStrategy::default(),
            max_length: 256,
        }
    }
}

impl OrtEmbeddingBuilder {
    /// Sets the path to the ONNX model file.
    #[must_use]
    pub fn model_path(mut self, path: impl AsRef<Path>) -> Self {
        self.model_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the path to `tokenizer.json`. Defaults to the one next to the model.
    #[must_use]
    pub fn tokenizer_path(mut self, path: impl AsRef<Path>) -> Self {
        self.tokenizer_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the reported model identity. Defaults to the model path.
    #[must_use]
    pub fn model_id(mut self, id: impl Into<String>) -> Self {
        self.model_id = Some(id.into());
        self
    }

    /// Sets the pooling strategy. Default: [`PoolingStrategy::Mean`].
    #[must_use]
    pub const fn pooling(mut self, strategy: PoolingStrategy) -> Self {
        self.pooling = strategy;
        self
    }

    /// Sets the token limit per text. Default: 256, the `all-MiniLM-L6-v2` window.
    #[must_use]
    pub const fn max_length(mut self, tokens: usize) -> Self {
        self.max_length = tokens;
        self
    }

    /// Loads the model.
    ///
    /// # Errors
    ///
    /// - [`OrtError::MissingModelPath`] / [`OrtError::ModelNotFound`] for a bad model path
    /// - [`OrtError::TokenizerNotFound`] when no tokenizer is found
    /// - [`OrtError::RuntimeDisabled`] without the `runtime` feature
    /// - loading errors from ONNX Runtime or the tokenizer
    pub fn build(self) -> Result<OrtEmbedding, OrtError> {
        let model_path = self.model_path.clone().ok_or(OrtError::MissingModelPath)?;
        if !model_path.is_file() {
            return Err(OrtError::ModelNotFound(model_path));
        }
        let tokenizer_path = match self.tokenizer_path.clone() {
            Some(path) if path.is_file() => path,
            Some(path) => return Err(OrtError::TokenizerNotFound(path)),
            None => find_tokenizer_file(model_path.parent().unwrap_or(&model_path))?,
        };
        let model_id = self
            .model_id
            .clone()
            .unwrap_or_else(|| model_path.display().to_string());
        self.load(&model_path, &tokenizer_path, model_id)
    }

    #[cfg(feature = "runtime")]
    fn load(
        self,
        model_path: &Path,
        tokenizer_path: &Path,
        model_id: String,
    ) -> Result<OrtEmbedding, OrtError> {
        let (runtime, dimension) = runtime::Runtime::load(model_path, tokenizer_path, self.max_length)?;
        info!(model = %model_id, dimension, pooling = ?self.pooling, "loaded onnx embedding model");
        Ok(OrtEmbedding {
            model_id,
            dimension,
            pooling: self.pooling,
            runtime,
        })
    }

    #[cfg(not(feature = "runtime"))]
    #[allow(clippy::unused_self, clippy::needless_pass_by_value)]
    fn load(
        self,
        model_path: &Path,
        _tokenizer_path: &Path,
        model_id: String,
    ) -> Result<OrtEmbedding, OrtError> {
        info!(model = %model_id, path = %model_path.display(), "onnx runtime not compiled in");
        Err(OrtError::RuntimeDisabled)
    }
}

/// L2 normalizes a vector in place; zero vectors are left untouched.
#[cfg_attr(not(feature = "runtime"), allow(dead_code))]
fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}

/// Finds the ONNX model file in a directory.
fn find_model_file(dir: &Path) -> Result<PathBuf, OrtError> {
    let candidates = [
        dir.join("model.onnx"),
        dir.join("onnx/model.onnx"),
        dir.join("onnx/model_fp32.onnx"),
        dir.join("onnx/model_quantized.onnx"),
    ];
    if let Some(found) = candidates.into_iter().find(|candidate| candidate.is_file()) {
        return Ok(found);
    }

    for search in [dir.to_path_buf(), dir.join("onnx")] {
        let Ok(entries) = std::fs::read_dir(&search) else {
            continue;
        };
        let mut models: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "onnx"))
            .collect();
        models.sort();
        if let Some(first) = models.into_iter().next() {
            return Ok(first);
        }
    }

    Err(OrtError::ModelNotFound(dir.to_path_buf()))
}

/// Finds `tokenizer.json` in a directory.
fn find_tokenizer_file(dir: &Path) -> Result<PathBuf, OrtError> {
    [dir.join("tokenizer.json"), dir.join("onnx/tokenizer.json")]
        .into_iter()
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| OrtError::TokenizerNotFound(dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn builder_requires_model_path() {
        let result = OrtEmbeddingBuilder::default().build();
        assert!(matches!(result, Err(OrtError::MissingModelPath)));
    }

    #[test]
    fn builder_validates_model_exists() {
        let result = OrtEmbedding::builder()
            .model_path("/nonexistent/model.onnx")
            .tokenizer_path("/nonexistent/tokenizer.json")
            .build();
        assert!(matches!(result, Err(OrtError::ModelNotFound(_))));
    }

    #[test]
    fn finds_model_and_tokenizer_in_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("onnx")).unwrap();
        fs::write(dir.path().join("onnx/model_O4.onnx"), b"").unwrap();
        fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        assert_eq!(
            find_model_file(dir.path()).unwrap(),
            dir.path().join("onnx/model_O4.onnx")
        );
        assert_eq!(
            find_tokenizer_file(dir.path()).unwrap(),
            dir.path().join("tokenizer.json")
        );
    }

    #[test]
    fn empty_directory_has_no_model() {
        let dir = tempdir().unwrap();
        assert!(matches!(find_model_file(dir.path()), Err(OrtError::ModelNotFound(_))));
        assert!(matches!(
            OrtEmbedding::from_directory(dir.path()),
            Err(OrtError::ModelNotFound(_))
        ));
    }

    #[cfg(not(feature = "runtime"))]
    #[test]
    fn loading_without_runtime_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("model.onnx"), b"").unwrap();
        fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();
        assert!(matches!(
            OrtEmbedding::from_directory(dir.path()),
            Err(OrtError::RuntimeDisabled)
        ));
    }

    #[test]
    fn l2_normalize_works() {
        let mut vec = vec![3.0, 4.0];
        l2_normalize(&mut vec);
        assert!((vec[0] - 0.6).abs() < 1e-6);
        assert!((vec[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
