//! Configuration for builds, retrieval and generation.
//!
//! Every setting has a default. [`RagConfig::from_env`] is the only place the process
//! environment is read; [`RagConfig::from_vars`] does the same from any key/value source.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{RagError, Result};
use crate::retriever::FilteredScoring;

/// Which generation backend answers questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// A model running in this process.
    #[default]
    Local,
    /// A hosted chat-completions API.
    Remote,
}

impl FromStr for BackendKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "llama" | "transformers" => Ok(Self::Local),
            "remote" | "openai" => Ok(Self::Remote),
            _ => Err(RagError::InvalidConfig {
                key: "backend".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Selected backend.
    pub backend: BackendKind,
    /// Model name sent to the remote API.
    pub remote_model: String,
    /// Remote API key.
    pub api_key: Option<String>,
    /// Remote API base URL.
    pub base_url: String,
    /// Path of the local model file.
    pub local_model_path: PathBuf,
    /// Deadline for one answer, retries included.
    pub timeout: Duration,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature; `None` uses the backend default.
    pub temperature: Option<f32>,
}

impl GenerationSettings {
    /// Temperature used by remote backends unless overridden.
    pub const REMOTE_TEMPERATURE: f32 = 0.2;

    /// Effective temperature: the override, or 0.2 for remote and 0.0 (greedy) for local.
    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(match self.backend {
            BackendKind::Remote => Self::REMOTE_TEMPERATURE,
            BackendKind::Local => 0.0,
        })
    }

    /// Falls back to the local backend when remote is selected without a key.
    #[must_use]
    pub fn resolved(mut self) -> Self {
        if self.backend == BackendKind::Remote
            && self.api_key.as_deref().is_none_or(|key| key.trim().is_empty())
        {
            warn!("remote generation selected without an API key, using the local backend");
            self.backend = BackendKind::Local;
        }
        self
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            remote_model: "gpt-4o-mini".into(),
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            local_model_path: PathBuf::from("models/generator.gguf"),
            timeout: Duration::from_secs(60),
            max_tokens: 256,
            temperature: None,
        }
    }
}

/// Configuration for building and querying snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct RagConfig {
    /// Root of the snapshot store.
    pub snapshot_dir: PathBuf,
    /// Embedding model identity: `hash:<dim>` or an ONNX model directory.
    pub embedding_model: String,
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Texts per embedding call.
    pub embed_batch_size: usize,
    /// Chunks retrieved when no `k` is given.
    pub default_top_k: usize,
    /// Context budget in characters.
    pub max_prompt_chars: usize,
    /// Excerpt length of displayed sources.
    pub excerpt_chars: usize,
    /// Sources attached to an answer.
    pub display_sources: usize,
    /// Where filtered queries take subset vectors from.
    pub filtered_scoring: FilteredScoring,
    /// Generation backend settings.
    pub generation: GenerationSettings,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("./vector_store"),
            embedding_model: "models/all-MiniLM-L6-v2".into(),
            chunk_size: 400,
            chunk_overlap: 60,
            embed_batch_size: 64,
            default_top_k: 5,
            max_prompt_chars: 8192,
            excerpt_chars: 500,
            display_sources: 2,
            filtered_scoring: FilteredScoring::Retained,
            generation: GenerationSettings::default(),
        }
    }
}

impl RagConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for custom configuration.
    #[must_use]
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::new()
    }

    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// See [`from_vars`](Self::from_vars).
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Reads overrides from `vars`.
    ///
    /// Recognized keys are `PLAINT_SNAPSHOT_DIR`, `PLAINT_EMBEDDING_MODEL`, `PLAINT_CHUNK_SIZE`,
    /// `PLAINT_CHUNK_OVERLAP`, `PLAINT_EMBED_BATCH_SIZE`, `PLAINT_TOP_K`,
    /// `PLAINT_MAX_PROMPT_CHARS`, `PLAINT_FILTERED_SCORING`, `PLAINT_LLM_PROVIDER`,
    /// `PLAINT_OPENAI_MODEL`, `OPENAI_API_KEY`, `PLAINT_OPENAI_BASE_URL`, `PLAINT_LOCAL_MODEL`,
    /// `PLAINT_GENERATION_TIMEOUT_SECS` and `PLAINT_MAX_NEW_TOKENS`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] for a value that does not parse, and validation
    /// errors from [`validate`](Self::validate).
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();
        let text = |key: &str| vars.get(key).map(|value| value.trim().to_string());

        let mut config = Self::default();
        if let Some(dir) = text("PLAINT_SNAPSHOT_DIR") {
            config.snapshot_dir = dir.into();
        }
        if let Some(model) = text("PLAINT_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        parse_into(&vars, "PLAINT_CHUNK_SIZE", &mut config.chunk_size)?;
        parse_into(&vars, "PLAINT_CHUNK_OVERLAP", &mut config.chunk_overlap)?;
        parse_into(&vars, "PLAINT_EMBED_BATCH_SIZE", &mut config.embed_batch_size)?;
        parse_into(&vars, "PLAINT_TOP_K", &mut config.default_top_k)?;
        parse_into(&vars, "PLAINT_MAX_PROMPT_CHARS", &mut config.max_prompt_chars)?;
        if let Some(scoring) = vars.get("PLAINT_FILTERED_SCORING") {
            config.filtered_scoring = scoring.parse()?;
        }

        let generation = &mut config.generation;
        if let Some(backend) = vars.get("PLAINT_LLM_PROVIDER") {
            generation.backend = backend.parse().map_err(|_| RagError::InvalidConfig {
                key: "PLAINT_LLM_PROVIDER".into(),
                value: backend.clone(),
            })?;
        }
        if let Some(model) = text("PLAINT_OPENAI_MODEL") {
            generation.remote_model = model;
        }
        generation.api_key = text("OPENAI_API_KEY");
        if let Some(url) = text("PLAINT_OPENAI_BASE_URL") {
            generation.base_url = url;
        }
        if let Some(path) = text("PLAINT_LOCAL_MODEL") {
            generation.local_model_path = path.into();
        }
        let mut timeout_secs = generation.timeout.as_secs();
        parse_into(&vars, "PLAINT_GENERATION_TIMEOUT_SECS", &mut timeout_secs)?;
        generation.timeout = Duration::from_secs(timeout_secs);
        parse_into(&vars, "PLAINT_MAX_NEW_TOKENS", &mut generation.max_tokens)?;

        config.generation = config.generation.resolved();
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that would otherwise fail deep inside a build or query.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidChunkWindow`] for a window whose stride is not positive
    /// - [`RagError::InvalidK`] for a zero default `k`
    /// - [`RagError::InvalidPromptBudget`] for a zero prompt budget
    /// - [`RagError::InvalidConfig`] for a zero batch size or timeout
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidChunkWindow {
                window_size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        if self.default_top_k == 0 {
            return Err(RagError::InvalidK(0));
        }
        if self.max_prompt_chars == 0 {
            return Err(RagError::InvalidPromptBudget);
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::InvalidConfig {
                key: "embed_batch_size".into(),
                value: "0".into(),
            });
        }
        if self.generation.timeout.is_zero() {
            return Err(RagError::InvalidConfig {
                key: "generation.timeout".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse_into<T: FromStr>(vars: &HashMap<String, String>, key: &str, slot: &mut T) -> Result<()> {
    if let Some(value) = vars.get(key) {
        *slot = value.trim().parse().map_err(|_| RagError::InvalidConfig {
            key: key.to_string(),
            value: value.clone(),
        })?;
    }
    Ok(())
}

/// Builder for [`RagConfig`].
#[derive(Debug, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Creates a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: RagConfig::default(),
        }
    }

    /// Starts from an existing configuration.
    #[must_use]
    pub const fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Sets the snapshot store root.
    #[must_use]
    pub fn snapshot_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_dir = path.into();
        self
    }

    /// Sets the embedding model identity.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Sets the chunk window and overlap in words.
    #[must_use]
    pub const fn chunking(mut self, size: usize, overlap: usize) -> Self {
        self.config.chunk_size = size;
        self.config.chunk_overlap = overlap;
        self
    }

    /// Sets the embedding batch size.
    #[must_use]
    pub const fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Sets the default number of chunks to retrieve.
    #[must_use]
    pub const fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Sets the context budget in characters.
    #[must_use]
    pub const fn max_prompt_chars(mut self, chars: usize) -> Self {
        self.config.max_prompt_chars = chars;
        self
    }

    /// Sets how many sources are shown and how long their excerpts are.
    #[must_use]
    pub const fn display(mut self, sources: usize, excerpt_chars: usize) -> Self {
        self.config.display_sources = sources;
        self.config.excerpt_chars = excerpt_chars;
        self
    }

    /// Sets how filtered subsets are scored.
    #[must_use]
    pub const fn filtered_scoring(mut self, scoring: FilteredScoring) -> Self {
        self.config.filtered_scoring = scoring;
        self
    }

    /// Selects the generation backend.
    #[must_use]
    pub const fn backend(mut self, backend: BackendKind) -> Self {
        self.config.generation.backend = backend;
        self
    }

    /// Sets the remote model name and API key.
    #[must_use]
    pub fn remote(mut self, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.config.generation.remote_model = model.into();
        self.config.generation.api_key = Some(api_key.into());
        self
    }

    /// Sets the local model path.
    #[must_use]
    pub fn local_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.generation.local_model_path = path.into();
        self
    }

    /// Sets the generation deadline.
    #[must_use]
    pub const fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation.timeout = timeout;
        self
    }

    /// Sets the token limit and temperature.
    #[must_use]
    pub const fn sampling(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.config.generation.max_tokens = max_tokens;
        self.config.generation.temperature = temperature;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        let mut config = self.config;
        config.generation = config.generation.resolved();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Result<RagConfig> {
        RagConfig::from_vars(pairs.iter().map(|(k, v)| (*k, *v)))
    }

    #[test]
    fn default_config() {
        let config = RagConfig::default();
        assert_eq!(config.snapshot_dir, PathBuf::from("./vector_store"));
        assert_eq!(config.chunk_size, 400);
        assert_eq!(config.chunk_overlap, 60);
        assert_eq!(config.default_top_k, 5);
        assert_eq!(config.max_prompt_chars, 8192);
        assert_eq!(config.display_sources, 2);
        assert_eq!(config.excerpt_chars, 500);
        assert_eq!(config.generation.backend, BackendKind::Local);
        assert_eq!(config.generation.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
        assert_eq!(vars(&[]).unwrap(), config);
    }

    #[test]
    fn builder_config() {
        let config = RagConfig::builder()
            .snapshot_dir("/data/store")
            .embedding_model("hash:256")
            .chunking(200, 20)
            .default_top_k(8)
            .filtered_scoring(FilteredScoring::Reembed)
            .backend(BackendKind::Remote)
            .remote("gpt-4o", "sk-test")
            .build()
            .unwrap();

        assert_eq!(config.snapshot_dir, PathBuf::from("/data/store"));
        assert_eq!(config.embedding_model, "hash:256");
        assert_eq!((config.chunk_size, config.chunk_overlap), (200, 20));
        assert_eq!(config.default_top_k, 8);
        assert_eq!(config.filtered_scoring, FilteredScoring::Reembed);
        assert_eq!(config.generation.backend, BackendKind::Remote);
        assert!((config.generation.temperature() - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn reads_overrides_from_vars() {
        let config = vars(&[
            ("PLAINT_SNAPSHOT_DIR", "/tmp/store"),
            ("PLAINT_CHUNK_SIZE", "300"),
            ("PLAINT_TOP_K", " 3 "),
            ("PLAINT_FILTERED_SCORING", "re-embed"),
            ("PLAINT_LLM_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-live"),
            ("PLAINT_GENERATION_TIMEOUT_SECS", "15"),
            ("PLAINT_MAX_NEW_TOKENS", "128"),
            ("PLAINT_OPENAI_BASE_URL", ""),
        ])
        .unwrap();

        assert_eq!(config.snapshot_dir, PathBuf::from("/tmp/store"));
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.filtered_scoring, FilteredScoring::Reembed);
        assert_eq!(config.generation.backend, BackendKind::Remote);
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-live"));
        assert_eq!(config.generation.timeout, Duration::from_secs(15));
        assert_eq!(config.generation.max_tokens, 128);
        assert_eq!(config.generation.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn remote_without_key_falls_back_to_local() {
        let config = vars(&[("PLAINT_LLM_PROVIDER", "remote")]).unwrap();
        assert_eq!(config.generation.backend, BackendKind::Local);
        assert!(config.generation.temperature().abs() < f32::EPSILON);

        let built = RagConfig::builder().backend(BackendKind::Remote).build().unwrap();
        assert_eq!(built.generation.backend, BackendKind::Local);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let err = vars(&[("PLAINT_TOP_K", "five")]).unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig { ref key, .. } if key == "PLAINT_TOP_K"));
        assert!(err.is_configuration());

        assert!(matches!(
            vars(&[("PLAINT_LLM_PROVIDER", "carrier-pigeon")]),
            Err(RagError::InvalidConfig { .. })
        ));
        assert!(matches!(
            vars(&[("PLAINT_CHUNK_OVERLAP", "400")]),
            Err(RagError::InvalidChunkWindow { .. })
        ));
        assert!(matches!(vars(&[("PLAINT_TOP_K", "0")]), Err(RagError::InvalidK(0))));
        assert!(matches!(
            RagConfig::builder().max_prompt_chars(0).build(),
            Err(RagError::InvalidPromptBudget)
        ));
    }
}
