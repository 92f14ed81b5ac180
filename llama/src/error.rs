use thiserror::Error;

/// Errors raised by the local llama.cpp backend.
#[derive(Debug, Error)]
pub enum LlamaError {
    /// Model loading failed or the model path is invalid.
    #[error("model error: {0}")]
    Model(String),
    /// Context initialization failed.
    #[error("context error: {0}")]
    Context(String),
    /// Tokenization or detokenization failed.
    #[error("token error: {0}")]
    Token(String),
    /// Decoding or sampling failed.
    #[error("decode error: {0}")]
    Decode(String),
    /// The prompt does not fit the context window.
    #[error("prompt of {tokens} tokens does not fit a context of {context}")]
    PromptTooLong {
        /// Prompt length in tokens.
        tokens: usize,
        /// Context window in tokens.
        context: u32,
    },
    /// The backend cannot run in this build or process.
    #[error("llama backend unavailable: {0}")]
    Unavailable(String),
}
