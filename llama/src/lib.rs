//! Local llama.cpp generation backend for plaint.
//!
//! [`Llama`] implements [`plaint_core::LanguageModel`] over a GGUF checkpoint. The model is
//! loaded lazily by the first request, so configuring a local backend costs nothing until a
//! question is asked. Inference runs on a dedicated thread; a caller that stops waiting (for
//! example on a deadline) simply drops the result.
//!
//! Messages are rendered with the model's chat template, or `ChatML` when it has none.
//! A temperature of zero or none at all selects greedy decoding.
//!
//! Build with the `native` feature to link llama.cpp. Without it every request fails with
//! [`LlamaError::Unavailable`].
//!
//! ```no_run
//! use plaint_core::{LanguageModel, llm::Request};
//! use plaint_llama::Llama;
//!
//! # async fn run() -> plaint_core::Result<()> {
//! let llama = Llama::builder("./models/generator.gguf")
//!     .n_ctx(4096)
//!     .max_tokens(256)
//!     .build();
//! let answer = llama
//!     .generate(Request::oneshot("You are concise.", "What is a chargeback?"))
//!     .await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
#[cfg(feature = "native")]
mod engine;
mod error;
mod prompt;

pub use client::{Builder, Llama};
pub use error::LlamaError;
