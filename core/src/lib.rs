//! # plaint-core
//!
//! `plaint-core` hosts the no-std trait APIs the rest of the workspace is built on. The retrieval
//! crate only ever talks to these traits, and every provider crate simply implements them.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │   plaint-rag    │───▶│   plaint-core    │◀───│   Providers     │
//! │                 │    │   (this crate)   │    │                 │
//! │ - chunk/index   │    │                  │    │ - onnx runtime  │
//! │ - retrieve      │    │ - EmbeddingModel │    │ - llama.cpp     │
//! │ - answer        │    │ - LanguageModel  │    │ - openai        │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! | Capability | Trait | Description |
//! |------------|-------|-------------|
//! | **Embeddings** | [`EmbeddingModel`] | Convert text to fixed-dimension vectors |
//! | **Generation** | [`LanguageModel`] | Turn a prompt into an answer |
//!
//! ## Example
//!
//! ```rust
//! use plaint_core::{LanguageModel, llm::{Message, Request}};
//!
//! async fn ask(model: impl LanguageModel) -> plaint_core::Result {
//!     let request = Request::new([
//!         Message::system("You are a concise assistant."),
//!         Message::user("What does APR stand for?"),
//!     ]);
//!     model.generate(request).await
//! }
//! ```

#![no_std]
extern crate alloc;

/// Text embeddings.
pub mod embedding;
pub mod llm;

use alloc::string::String;

#[doc(inline)]
pub use embedding::EmbeddingModel;
#[doc(inline)]
pub use llm::LanguageModel;

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;
