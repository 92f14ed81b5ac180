//! Embedding model and generation backend construction for the CLI.

use anyhow::{Context, Result};
use plaint_core::{
    EmbeddingModel, LanguageModel,
    llm::{Parameters, Profile, Request},
};
use plaint_llama::Llama;
use plaint_openai::OpenAI;
use plaint_ort::OrtEmbedding;
use plaint_rag::{BackendKind, GenerationSettings, HashEmbedder};

/// Embedding model selected by its identity string.
#[derive(Debug)]
pub enum Embedding {
    /// `hash:<dim>` feature hashing, no model files needed.
    Hash(HashEmbedder),
    /// ONNX sentence encoder loaded from a model directory.
    Onnx(OrtEmbedding),
}

impl Embedding {
    /// Resolves `model_id`: `hash:<dim>` selects the hashing embedder, anything else is an ONNX
    /// model directory.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `hash:` identity or an unusable model directory.
    pub fn from_model_id(model_id: &str) -> Result<Self> {
        if let Some(hash) = HashEmbedder::from_model_id(model_id) {
            return Ok(Self::Hash(hash?));
        }
        let model = OrtEmbedding::from_directory(model_id)
            .with_context(|| format!("failed to open embedding model `{model_id}`"))?;
        Ok(Self::Onnx(model))
    }
}

impl EmbeddingModel for Embedding {
    fn dim(&self) -> usize {
        match self {
            Self::Hash(model) => model.dim(),
            Self::Onnx(model) => model.dim(),
        }
    }

    fn model_id(&self) -> &str {
        match self {
            Self::Hash(model) => model.model_id(),
            Self::Onnx(model) => model.model_id(),
        }
    }

    async fn embed(&self, text: &str) -> plaint_core::Result<Vec<f32>> {
        match self {
            Self::Hash(model) => model.embed(text).await,
            Self::Onnx(model) => model.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> plaint_core::Result<Vec<Vec<f32>>> {
        match self {
            Self::Hash(model) => model.embed_batch(texts).await,
            Self::Onnx(model) => model.embed_batch(texts).await,
        }
    }
}

/// Generation backend chosen once from configuration.
#[derive(Debug, Clone)]
pub enum Backend {
    /// llama.cpp in this process.
    Local(Llama),
    /// OpenAI-compatible chat completions.
    Remote(OpenAI),
}

impl Backend {
    /// Builds the backend `settings` select. Nothing is loaded or contacted yet.
    #[must_use]
    pub fn from_settings(settings: &GenerationSettings) -> Self {
        let settings = settings.clone().resolved();
        match (settings.backend, settings.api_key.as_deref()) {
            (BackendKind::Remote, Some(api_key)) => Self::Remote(
                OpenAI::builder(api_key)
                    .model(settings.remote_model.as_str())
                    .base_url(settings.base_url.as_str())
                    .temperature(settings.temperature())
                    .max_tokens(settings.max_tokens)
                    .request_timeout(settings.timeout)
                    .build(),
            ),
            _ => Self::Local(
                Llama::builder(&settings.local_model_path)
                    .max_tokens(settings.max_tokens)
                    .build(),
            ),
        }
    }
}

/// Sampling parameters for the backend `settings` actually select.
///
/// A remote selection without a key falls back to local generation, and so to its greedy
/// default temperature.
#[must_use]
pub fn parameters(settings: &GenerationSettings) -> Parameters {
    let settings = settings.clone().resolved();
    Parameters::default()
        .temperature(settings.temperature())
        .max_tokens(settings.max_tokens)
}

impl LanguageModel for Backend {
    async fn generate(&self, request: Request) -> plaint_core::Result {
        match self {
            Self::Local(model) => model.generate(request).await,
            Self::Remote(model) => model.generate(request).await,
        }
    }

    fn profile(&self) -> Profile {
        match self {
            Self::Local(model) => model.profile(),
            Self::Remote(model) => model.profile(),
        }
    }
}
