//! Per-user conversation memory.
//!
//! - `ContextManager`: owns one user's state and applies the memory policy
//! - `CompletionService` / `ConversationStore`: the ports it depends on
//! - `ManagerRegistry`: lock-per-user map of managers
//! - `budget`, `prompt`, `reflection`: the pure pieces of the policy

pub mod budget;
pub mod completion;
pub mod manager;
pub mod prompt;
pub mod reflection;
pub mod registry;
pub mod store;

#[cfg(test)]
pub(crate) mod mock;
