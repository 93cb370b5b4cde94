//! Interactive CLI chat with persistent memory.
//!
//! Streams replies with a thinking spinner, renders them as markdown, and
//! exposes the user's memory through slash commands. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;
