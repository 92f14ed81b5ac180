//! Command-line interface for plaint.
//!
//! The `plaint` binary builds snapshots from JSON Lines complaint exports and answers questions
//! against the current snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Build a snapshot with the offline hashing embedder
//! PLAINT_EMBEDDING_MODEL=hash:384 cargo run -p plaint-cli -- build --input complaints.jsonl
//!
//! # Ranked chunks only, no generation
//! cargo run -p plaint-cli -- search "duplicate card fees" --category "Credit card" -k 5
//!
//! # Answer with the remote backend
//! OPENAI_API_KEY=xxx cargo run -p plaint-cli -- ask "Why do customers dispute fees?" --provider openai
//!
//! # Snapshot parameters, counts and the chunk table
//! cargo run -p plaint-cli -- inspect --chunks
//! ```

pub mod provider;
pub mod report;

pub use provider::{Backend, Embedding};
