//! # Embedding Module
//!
//! Embeddings are dense vector representations of text that capture semantic meaning. Similar
//! texts produce similar vectors, which is what makes nearest-neighbour retrieval work.
//!
//! An embedding model is identified by a [`model_id`](EmbeddingModel::model_id). Vectors produced
//! by different models live in different spaces and must never be compared with each other, so
//! consumers record the identity next to every vector they persist.
//!
//! ```rust
//! use plaint_core::EmbeddingModel;
//!
//! async fn example<T: EmbeddingModel>(model: &T) -> plaint_core::Result<()> {
//!     let embedding = model.embed("card was charged twice").await?;
//!     assert_eq!(embedding.len(), model.dim());
//!     Ok(())
//! }
//! ```

use alloc::{string::String, vec::Vec};
use core::future::Future;

/// A type alias for an embedding vector of 32-bit floats.
pub type Embedding = Vec<f32>;

/// Converts text to vector representations.
///
/// # Implementation Requirements
///
/// - [`embed`](EmbeddingModel::embed) must return vectors with length equal to [`dim`](EmbeddingModel::dim)
/// - the same input on the same model instance must produce the same vector
/// - [`model_id`](EmbeddingModel::model_id) must change whenever the vector space changes
///
/// # Example
///
/// ```rust
/// use plaint_core::EmbeddingModel;
///
/// struct Constant;
///
/// impl EmbeddingModel for Constant {
///     fn dim(&self) -> usize {
///         2
///     }
///
///     fn model_id(&self) -> &str {
///         "constant"
///     }
///
///     async fn embed(&self, _text: &str) -> plaint_core::Result<Vec<f32>> {
///         Ok(vec![1.0, 0.0])
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let embedding = Constant.embed("anything").await.unwrap();
/// assert_eq!(embedding, vec![1.0, 0.0]);
/// # });
/// ```
pub trait EmbeddingModel: Send + Sync {
    /// Returns the embedding vector dimension.
    fn dim(&self) -> usize;

    /// Stable identity of the model (name, path or hash-space descriptor).
    fn model_id(&self) -> &str;

    /// Converts text to an embedding vector of length [`dim`](EmbeddingModel::dim).
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send;

    /// Converts a batch of texts, preserving input order.
    ///
    /// The default implementation embeds one text at a time. Providers with native batching
    /// should override it.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Embedding>>> + Send {
        async move {
            let mut embeddings = Vec::with_capacity(texts.len());
            for text in texts {
                embeddings.push(self.embed(text).await?);
            }
            Ok(embeddings)
        }
    }
}

impl<T: EmbeddingModel> EmbeddingModel for &T {
    fn dim(&self) -> usize {
        T::dim(self)
    }

    fn model_id(&self) -> &str {
        T::model_id(self)
    }

    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send {
        T::embed(self, text)
    }

    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Embedding>>> + Send {
        T::embed_batch(self, texts)
    }
}

impl<T: EmbeddingModel> EmbeddingModel for alloc::sync::Arc<T> {
    fn dim(&self) -> usize {
        T::dim(self)
    }

    fn model_id(&self) -> &str {
        T::model_id(self)
    }

    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send {
        T::embed(self, text)
    }

    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = crate::Result<Vec<Embedding>>> + Send {
        T::embed_batch(self, texts)
    }
}
