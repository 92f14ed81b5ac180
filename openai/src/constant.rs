//! Model and endpoint constants.
//!
//! Only stable chat model names are listed. Any other model string can be passed to
//! [`OpenAI::with_model`](crate::OpenAI::with_model).

/// Default `OpenAI` API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// [`Deepseek`](https://api-docs.deepseek.com)'s OpenAI-compatible base URL.
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
/// [`OpenRouter`](https://openrouter.ai)'s OpenAI-compatible base URL.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Small, inexpensive GPT-4o variant. The default answer model.
pub const GPT4O_MINI: &str = "gpt-4o-mini";
/// GPT-4o.
pub const GPT4O: &str = "gpt-4o";
/// Small GPT-4.1 variant.
pub const GPT4_1_MINI: &str = "gpt-4.1-mini";
/// GPT-4.1.
pub const GPT4_1: &str = "gpt-4.1";
