//! Infrastructure layer for memochat.
//!
//! Contains implementations of the ports defined in `memochat-core`: the
//! OpenAI-compatible LLM provider, the LLM-backed completion service, the
//! YAML conversation store, and the global config loader.

pub mod config;
pub mod filesystem;
pub mod llm;
