//! HTTP request handlers.

pub mod chat_completions;
