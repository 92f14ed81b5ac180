//! llama.cpp model loading and token generation.

use llama_cpp_2::{
    LlamaCppError,
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{AddBos, LlamaChatMessage, LlamaModel, params::LlamaModelParams},
    sampling::LlamaSampler,
};
use plaint_core::llm::Message;
use std::num::NonZeroU32;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

use crate::client::LlamaConfig;
use crate::error::LlamaError;
use crate::prompt::{Sampling, chatml};

fn init_backend() -> Result<LlamaBackend, LlamaError> {
    match LlamaBackend::init() {
        Ok(backend) => Ok(backend),
        Err(LlamaCppError::BackendAlreadyInitialized) => Ok(LlamaBackend {}),
        Err(err) => Err(LlamaError::Model(err.to_string())),
    }
}

/// A model loaded on first use and shared afterwards.
#[derive(Default)]
pub(crate) struct LazyEngine {
    engine: OnceLock<Engine>,
    loading: Mutex<()>,
}

impl std::fmt::Debug for LazyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEngine")
            .field("loaded", &self.engine.get().is_some())
            .finish_non_exhaustive()
    }
}

impl LazyEngine {
    pub(crate) fn get_or_load(&self, config: &LlamaConfig) -> Result<&Engine, LlamaError> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        let _loading = self
            .loading
            .lock()
            .map_err(|_| LlamaError::Unavailable("model loader is poisoned".into()))?;
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }
        let engine = Engine::load(config)?;
        Ok(self.engine.get_or_init(|| engine))
    }
}

pub(crate) struct Engine {
    backend: LlamaBackend,
    model: LlamaModel,
}

impl Engine {
    fn load(config: &LlamaConfig) -> Result<Self, LlamaError> {
        if !config.model_path.is_file() {
            return Err(LlamaError::Model(format!(
                "model file not found: {}",
                config.model_path.display()
            )));
        }
        let backend = init_backend()?;
        let params = LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers);
        let model = LlamaModel::load_from_file(&backend, &config.model_path, &params)
            .map_err(|err| LlamaError::Model(err.to_string()))?;
        info!(model = %config.model_path.display(), context = config.n_ctx, "loaded llama model");
        Ok(Self { backend, model })
    }

    pub(crate) fn generate(
        &self,
        config: &LlamaConfig,
        messages: &[Message],
        sampling: Sampling,
        max_tokens: u32,
    ) -> Result<String, LlamaError> {
        let prompt = self.render(config, messages)?;
        let tokens = self
            .model
            .str_to_token(&prompt, AddBos::Always)
            .map_err(|err| LlamaError::Token(err.to_string()))?;
        let budget = usize::try_from(config.n_ctx).unwrap_or(usize::MAX);
        if tokens.is_empty() || tokens.len() >= budget {
            return Err(LlamaError::PromptTooLong {
                tokens: tokens.len(),
                context: config.n_ctx,
            });
        }
        let max_tokens = max_tokens.min(u32::try_from(budget - tokens.len()).unwrap_or(u32::MAX));

        let params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(config.n_ctx))
            .with_n_threads(config.n_threads)
            .with_n_threads_batch(config.n_threads);
        let mut context = self
            .model
            .new_context(&self.backend, params)
            .map_err(|err| LlamaError::Context(err.to_string()))?;

        let mut batch = LlamaBatch::new(tokens.len(), 1);
        batch
            .add_sequence(&tokens, 0, false)
            .map_err(|err| LlamaError::Decode(err.to_string()))?;
        context
            .decode(&mut batch)
            .map_err(|err| LlamaError::Decode(err.to_string()))?;

        let mut sampler = sampler(sampling);
        sampler.accept_many(tokens.iter());

        let mut output = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut position = i32::try_from(tokens.len()).map_err(|err| LlamaError::Decode(err.to_string()))?;
        let mut generated = 0;
        while generated < max_tokens {
            let token = sampler.sample(&context, -1);
            sampler.accept(token);
            if self.model.is_eog_token(token) {
                break;
            }
            let piece = self
                .model
                .token_to_piece(token, &mut decoder, true, None)
                .map_err(|err| LlamaError::Token(err.to_string()))?;
            output.push_str(&piece);

            let mut step = LlamaBatch::new(1, 1);
            step.add(token, position, &[0], true)
                .map_err(|err| LlamaError::Decode(err.to_string()))?;
            context
                .decode(&mut step)
                .map_err(|err| LlamaError::Decode(err.to_string()))?;
            position += 1;
            generated += 1;
        }

        debug!(prompt_tokens = tokens.len(), generated, "llama generation finished");
        Ok(output)
    }

    /// Applies the configured or embedded chat template, falling back to `ChatML`.
    fn render(&self, config: &LlamaConfig, messages: &[Message]) -> Result<String, LlamaError> {
        let template = match &config.chat_template {
            Some(name) => llama_cpp_2::model::LlamaChatTemplate::new(name).ok(),
            None => self.model.chat_template(None).ok(),
        };
        let Some(template) = template else {
            return Ok(chatml(messages));
        };
        let chat = messages
            .iter()
            .map(|message| {
                LlamaChatMessage::new(message.role().as_str().into(), message.content().into())
                    .map_err(|err| LlamaError::Token(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.model
            .apply_chat_template(&template, &chat, true)
            .map_err(|err| LlamaError::Model(err.to_string()))
    }
}

fn sampler(sampling: Sampling) -> LlamaSampler {
    match sampling {
        Sampling::Greedy => LlamaSampler::greedy(),
        Sampling::Random {
            temperature,
            top_p,
            seed,
        } => {
            let mut stages = Vec::new();
            if let Some(top_p) = top_p {
                stages.push(LlamaSampler::top_p(top_p, 1));
            }
            stages.push(LlamaSampler::temp(temperature));
            stages.push(LlamaSampler::dist(seed));
            LlamaSampler::chain_simple(stages)
        }
    }
}
