//! HTTP layer for memochat.
//!
//! Axum-based, OpenAI-compatible `/v1/chat/completions` with per-user
//! memory, plus a `/health` probe. CORS is open.

pub mod error;
pub mod handlers;
pub mod router;
