#![no_std]
//! # plaint
//!
//! Façade crate that re-exports [`plaint_core`] and, behind features, the retrieval crate and
//! the provider integrations. Pull this crate into a binary to build and query complaint
//! snapshots without naming each workspace crate.
//!
//! | Feature | Re-export | Contents |
//! |---------|-----------|----------|
//! | `rag` (default) | [`rag`] | chunking, embedding, snapshots, retrieval, prompts, answers |
//! | `openai` | `openai` | remote chat-completions backend |
//! | `llama` | `llama` | local llama.cpp backend (`llama-native` compiles llama.cpp in) |
//! | `ort` | `ort` | ONNX sentence embedder (`ort-runtime` compiles ONNX Runtime in) |
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "rag")]
//! # mod demo {
//! use plaint::LanguageModel;
//! use plaint::rag::{
//!     Composer, Embedder, Generator, HashEmbedder, PromptAssembler, Retriever, SnapshotHandle,
//!     SnapshotStore,
//! };
//! use std::sync::Arc;
//!
//! pub async fn ask(model: impl LanguageModel, question: &str) -> plaint::rag::Result<String> {
//!     let snapshot = SnapshotStore::new("./vector_store").load_current()?;
//!     let embedder = Arc::new(Embedder::new(HashEmbedder::new(384)?));
//!     let retriever = Retriever::new(embedder, Arc::new(SnapshotHandle::new(snapshot)));
//!     let composer = Composer::new(retriever, PromptAssembler::new(8192)?, Generator::new(model));
//!     Ok(composer.answer_question(question, None, 5).await?.answer)
//! }
//! # }
//! ```

pub use plaint_core::*;

#[cfg(feature = "rag")]
#[doc(inline)]
pub use plaint_rag as rag;

#[cfg(feature = "openai")]
#[doc(inline)]
pub use plaint_openai as openai;

#[cfg(feature = "llama")]
#[doc(inline)]
pub use plaint_llama as llama;

#[cfg(feature = "ort")]
#[doc(inline)]
pub use plaint_ort as ort;
