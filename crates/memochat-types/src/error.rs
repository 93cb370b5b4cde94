//! Error types shared across memochat crates.

use crate::llm::LlmError;

/// Errors from the durable conversation store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document exists but cannot be decoded.
    #[error("malformed conversation document: {0}")]
    Malformed(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by context manager operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("summarization failed: {0}")]
    Summarize(#[source] LlmError),

    #[error("reflection failed: {0}")]
    Reflect(#[source] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
