//! Main chat loop orchestration.
//!
//! Loads the user's memory, prints the banner, then alternates between
//! reading input and streaming replies. Every exchange goes through the
//! context manager, so summaries and reflections accumulate across runs.

use std::time::{Duration, Instant};

use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use memochat_core::memory::completion::CompletionService;
use memochat_core::memory::manager::ContextManager;
use memochat_core::memory::registry::sanitize_user_id;
use memochat_infra::filesystem::conversation::YamlConversationStore;
use memochat_infra::llm::completion::LlmCompletionService;
use memochat_types::conversation::ChatStreamEvent;
use memochat_types::llm::{LlmError, MessageRole};

use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

type Manager = ContextManager<LlmCompletionService, YamlConversationStore>;

/// Run the interactive chat loop for `user`.
pub async fn run_chat_loop(state: &AppState, user: &str) -> anyhow::Result<()> {
    let user_id = sanitize_user_id(user);
    let mut manager = ContextManager::new(
        user_id.clone(),
        state.completion.clone(),
        state.store.clone(),
        state.config.memory.clone(),
    );

    // A snapshot that fails to load is left alone on disk: the session runs
    // on an empty memory and never saves over it.
    let persist = match manager.load().await {
        Ok(()) => true,
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "failed to load memory");
            eprintln!(
                "\n  {} Could not load memory: {e}",
                style("!").yellow().bold()
            );
            eprintln!(
                "  {}",
                style("Continuing with an empty memory; this session will not be saved.").dim()
            );
            false
        }
    };

    print_welcome_banner(state.model(), manager.state(), &manager.location());

    let renderer = ChatRenderer::new();
    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        match chat_input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                println!(
                    "\n  {}",
                    style("Press Ctrl+D or type /exit to leave, or keep chatting.").dim()
                );
                continue;
            }
            InputEvent::Message(text) => {
                if text.is_empty() {
                    continue;
                }

                if let Some(cmd) = commands::parse(&text) {
                    match cmd {
                        ChatCommand::Help => commands::print_help(),
                        ChatCommand::Clear => chat_input.clear(),
                        ChatCommand::Memory => renderer.print_memory_stats(manager.state()),
                        ChatCommand::Summary => renderer.print_summary(manager.state()),
                        ChatCommand::Reflections => {
                            renderer.print_reflections(&manager.state().reflections)
                        }
                        ChatCommand::Exit => break,
                        ChatCommand::Unknown(name) => {
                            println!(
                                "\n  {} Unknown command: {}. Type /help for available commands.\n",
                                style("?").yellow().bold(),
                                style(name).dim()
                            );
                        }
                    }
                    continue;
                }

                exchange(&mut manager, &renderer, state.model(), text, persist).await;
            }
        }
    }

    if persist {
        match manager.save().await {
            Ok(()) => println!("\n  {}", style("Memory saved. Goodbye!").dim()),
            Err(e) => eprintln!(
                "\n  {} Failed to save memory: {e}",
                style("!").red().bold()
            ),
        }
    } else {
        println!("\n  {}", style("Session ended.").dim());
    }
    chat_input.flush();

    info!(
        user_id = %user_id,
        turns = manager.state().turn_count(),
        reflections = manager.state().reflections.len(),
        "chat session ended"
    );
    Ok(())
}

/// One user message through to a recorded reply.
async fn exchange(
    manager: &mut Manager,
    renderer: &ChatRenderer,
    model: &str,
    text: String,
    persist: bool,
) {
    // Memory goes back to this point if no reply arrives, so a retry does
    // not record the message twice.
    let before = manager.state().clone();
    if let Err(e) = manager.record_turn(MessageRole::User, text).await {
        manager.restore(before);
        eprintln!("\n  {} {e}", style("!").red().bold());
        eprintln!("  {}", style("Message not sent; try again.").dim());
        return;
    }

    let spinner = thinking_spinner();
    let start_time = Instant::now();
    let mut stream = manager
        .completion()
        .stream_chat(manager.build_prompt_context());

    let mut full_response = String::new();
    let mut first_token_received = false;
    let mut outcome: Result<u32, LlmError> =
        Err(LlmError::Stream("reply ended before completion".to_string()));

    while let Some(item) = stream.next().await {
        match item {
            Ok(ChatStreamEvent::Delta(delta)) => {
                if !first_token_received {
                    spinner.finish_and_clear();
                    first_token_received = true;
                    print!("\n  {} ", style("AI").cyan().bold());
                }
                renderer.print_streaming_token(&delta);
                full_response.push_str(&delta);
            }
            Ok(ChatStreamEvent::Finished { total_tokens }) => {
                outcome = Ok(total_tokens);
                break;
            }
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }

    if !first_token_received {
        spinner.finish_and_clear();
    }

    let total_tokens = match outcome {
        Ok(tokens) => tokens,
        Err(e) => {
            manager.restore(before);
            eprintln!("\n  {} LLM error: {e}", style("!").red().bold());
            eprintln!(
                "  {}",
                style("Type a message to retry, /exit to quit.").dim()
            );
            return;
        }
    };

    let response_ms = start_time.elapsed().as_millis() as u64;
    println!();
    renderer.print_stats_footer(total_tokens, response_ms, model);
    println!();

    if let Err(e) = manager.record_turn(MessageRole::Assistant, full_response).await {
        eprintln!(
            "  {} Reply kept, but compaction failed: {e}",
            style("!").yellow().bold()
        );
    }

    if persist {
        if let Err(e) = manager.save().await {
            warn!(error = %e, "auto-save failed");
            eprintln!("  {} Auto-save failed: {e}", style("!").yellow().bold());
        }
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
