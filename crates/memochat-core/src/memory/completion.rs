//! CompletionService trait definition.
//!
//! The capability set the context manager needs from a language model:
//! plain chat, streaming chat, summarization, and reflection. The production
//! implementation (`LlmCompletionService`) lives in memochat-infra; tests
//! use scripted doubles.

use std::pin::Pin;

use futures_util::Stream;

use memochat_types::conversation::{ChatReply, ChatStreamEvent, ReflectionDraft, Turn};
use memochat_types::llm::LlmError;

/// Boxed stream of chat output, ending with [`ChatStreamEvent::Finished`].
pub type ChatStream =
    Pin<Box<dyn Stream<Item = Result<ChatStreamEvent, LlmError>> + Send + 'static>>;

/// Trait for the language model operations memory management relies on.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). The
/// `stream_chat` method returns a boxed stream so callers can hold it
/// without naming the implementation type.
pub trait CompletionService: Send + Sync {
    /// Send the prompt and receive the full assistant reply.
    fn chat(
        &self,
        turns: &[Turn],
    ) -> impl std::future::Future<Output = Result<ChatReply, LlmError>> + Send;

    /// Send the prompt and receive incremental deltas.
    ///
    /// The stream yields `Delta`s followed by exactly one `Finished`.
    fn stream_chat(&self, turns: Vec<Turn>) -> ChatStream;

    /// Condense `turns` into a summary.
    fn summarize(
        &self,
        turns: &[Turn],
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;

    /// Distill an insight from `turns`, given the running `summary` (may be empty).
    fn generate_reflection(
        &self,
        turns: &[Turn],
        summary: &str,
    ) -> impl std::future::Future<Output = Result<ReflectionDraft, LlmError>> + Send;
}
