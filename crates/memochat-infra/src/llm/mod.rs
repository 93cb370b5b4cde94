//! LLM integrations.
//!
//! - `openai_compat`: provider for any OpenAI chat-completions endpoint
//! - `completion`: `CompletionService` built on a `BoxLlmProvider`

pub mod completion;
pub mod openai_compat;
mod span_stream;
