//! Shared domain types for memochat.
//!
//! This crate contains the core domain types used across the workspace:
//! conversation turns, reflections, the per-user conversation state, LLM
//! request/response shapes, configuration, and their associated error types.
//!
//! Zero infrastructure dependencies: only serde, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
