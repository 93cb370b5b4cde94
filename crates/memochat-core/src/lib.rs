//! Business logic and service trait definitions for memochat.
//!
//! This crate defines the "ports" (completion service, conversation store,
//! LLM provider) that the infrastructure layer implements, plus the context
//! manager that drives per-user memory. It depends only on `memochat-types`
//! -- never on `memochat-infra` or any network/IO crate.

pub mod llm;
pub mod memory;
