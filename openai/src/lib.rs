//! OpenAI-compatible chat completions backend for plaint, built on `reqwest` and the shared
//! `plaint-core` abstractions.
//!
//! The client sends one non-streaming `/chat/completions` request per
//! [`generate`](plaint_core::LanguageModel::generate) call. Its profile reports a remote
//! deployment, so the retrieval layer's generator may retry it once within the deadline.
//!
//! ```no_run
//! use plaint_core::{LanguageModel, llm::Request};
//! use plaint_openai::OpenAI;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let model = OpenAI::new(std::env::var("OPENAI_API_KEY")?)
//!     .with_model("gpt-4o-mini")
//!     .with_temperature(0.2);
//!
//! let answer = model
//!     .generate(Request::oneshot(
//!         "You are a concise, evidence-backed financial analyst assistant.",
//!         "Summarise the complaints about late fees.",
//!     ))
//!     .await?;
//! println!("{answer}");
//! # Ok(()) }
//! ```

mod client;
mod error;
mod request;
mod response;

pub use client::{Builder, OpenAI};
pub use error::OpenAIError;

mod constant;
pub use constant::*;

pub(crate) const DEFAULT_MODEL: &str = GPT4O_MINI;
pub(crate) const DEFAULT_BASE_URL: &str = OPENAI_BASE_URL;
pub(crate) const DEFAULT_TEMPERATURE: f32 = 0.2;
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 256;
