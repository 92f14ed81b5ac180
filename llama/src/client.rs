use plaint_core::{
    LanguageModel,
    llm::{Deployment, Message, Profile, Request},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LlamaError;
use crate::prompt::Sampling;

/// Local llama.cpp model. The GGUF file is loaded on the first request and shared by clones.
#[derive(Debug, Clone)]
pub struct Llama {
    config: Arc<LlamaConfig>,
    #[cfg(feature = "native")]
    engine: Arc<crate::engine::LazyEngine>,
}

#[derive(Debug, Clone)]
pub(crate) struct LlamaConfig {
    pub(crate) model_path: PathBuf,
    pub(crate) chat_template: Option<String>,
    pub(crate) n_ctx: u32,
    pub(crate) n_threads: i32,
    pub(crate) n_gpu_layers: u32,
    pub(crate) max_tokens: u32,
}

impl Llama {
    /// Points at a GGUF model with default settings. Nothing is loaded yet.
    #[must_use]
    pub fn from_file(model_path: impl AsRef<Path>) -> Self {
        Self::builder(model_path).build()
    }

    /// Starts building a llama backend with custom options.
    #[must_use]
    pub fn builder(model_path: impl AsRef<Path>) -> Builder {
        Builder::new(model_path)
    }

    /// Path of the GGUF model.
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.config.model_path
    }

    /// Model name derived from the file name.
    #[must_use]
    pub fn name(&self) -> String {
        self.config
            .model_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("llama-local")
            .to_string()
    }

    #[cfg(feature = "native")]
    async fn run(
        &self,
        messages: Vec<Message>,
        sampling: Sampling,
        max_tokens: u32,
    ) -> Result<String, LlamaError> {
        let (sender, receiver) = async_channel::bounded(1);
        let config = Arc::clone(&self.config);
        let engine = Arc::clone(&self.engine);
        std::thread::Builder::new()
            .name("llama-generate".into())
            .spawn(move || {
                let outcome = engine
                    .get_or_load(&config)
                    .and_then(|engine| engine.generate(&config, &messages, sampling, max_tokens));
                // The receiver is gone once the caller's deadline has passed.
                let _ = sender.send_blocking(outcome);
            })
            .map_err(|err| LlamaError::Unavailable(err.to_string()))?;
        receiver
            .recv()
            .await
            .map_err(|_| LlamaError::Unavailable("generation thread exited".into()))?
    }

    #[cfg(not(feature = "native"))]
    #[allow(clippy::unused_async, clippy::needless_pass_by_value)]
    async fn run(
        &self,
        messages: Vec<Message>,
        sampling: Sampling,
        max_tokens: u32,
    ) -> Result<String, LlamaError> {
        tracing::debug!(
            model = %self.config.model_path.display(),
            messages = messages.len(),
            ?sampling,
            max_tokens,
            "llama.cpp support not compiled in"
        );
        Err(LlamaError::Unavailable(
            "llama.cpp support is not compiled in; enable the `native` feature".into(),
        ))
    }
}

impl LanguageModel for Llama {
    async fn generate(&self, request: Request) -> plaint_core::Result {
        let sampling = Sampling::from_parameters(request.parameters());
        let max_tokens = request
            .parameters()
            .max_tokens
            .unwrap_or(self.config.max_tokens);
        let messages = request.messages().to_vec();
        Ok(self.run(messages, sampling, max_tokens).await?)
    }

    fn profile(&self) -> Profile {
        Profile::new(self.name(), "llama.cpp", Deployment::Local)
    }
}

/// Builder for local llama.cpp model configuration.
#[derive(Debug, Clone)]
pub struct Builder {
    config: LlamaConfig,
}

impl Builder {
    fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            config: LlamaConfig {
                model_path: model_path.as_ref().to_path_buf(),
                chat_template: None,
                n_ctx: 4096,
                n_threads: 4,
                n_gpu_layers: 0,
                max_tokens: 256,
            },
        }
    }

    /// Number of layers offloaded to GPU.
    #[must_use]
    pub const fn n_gpu_layers(mut self, n_gpu_layers: u32) -> Self {
        self.config.n_gpu_layers = n_gpu_layers;
        self
    }

    /// Context window in tokens. Prompt plus answer must fit.
    #[must_use]
    pub const fn n_ctx(mut self, n_ctx: u32) -> Self {
        self.config.n_ctx = n_ctx;
        self
    }

    /// Overrides the chat template embedded in the model.
    #[must_use]
    pub fn chat_template(mut self, template: impl Into<String>) -> Self {
        self.config.chat_template = Some(template.into());
        self
    }

    /// Number of decode threads.
    #[must_use]
    pub const fn n_threads(mut self, n_threads: i32) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Tokens generated when a request sets no limit.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Finishes the configuration. The model is loaded by the first request.
    #[must_use]
    pub fn build(self) -> Llama {
        Llama {
            config: Arc::new(self.config),
            #[cfg(feature = "native")]
            engine: Arc::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_local_and_named_after_the_file() {
        let llama = Llama::builder("models/phi-3-mini.Q4_K_M.gguf").n_ctx(2048).build();
        let profile = llama.profile();
        assert_eq!(profile.name, "phi-3-mini.Q4_K_M");
        assert_eq!(profile.provider, "llama.cpp");
        assert_eq!(profile.deployment, Deployment::Local);
        assert!(!profile.deployment.is_retryable());
    }

    #[tokio::test]
    async fn missing_backend_is_an_error_not_a_panic() {
        let llama = Llama::from_file("/nonexistent/model.gguf");
        let result = llama.generate(Request::new([Message::user("hello")])).await;
        assert!(result.is_err());
    }
}
