//! `memochat show <user>`: inspect a stored conversation without loading a
//! model.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use memochat_core::memory::registry::sanitize_user_id;
use memochat_core::memory::store::ConversationStore;
use memochat_infra::filesystem::conversation::YamlConversationStore;
use memochat_types::conversation::{ConversationState, Reflection};

/// Longest reflection preview shown in the table, in characters.
const PREVIEW_CHARS: usize = 60;

/// Print the stored memory for `user`.
pub async fn show_memory(
    store: &YamlConversationStore,
    user: &str,
    importance_threshold: u8,
    json: bool,
) -> Result<()> {
    let user_id = sanitize_user_id(user);
    let state = store
        .load(&user_id)
        .await
        .with_context(|| format!("failed to read memory for '{user_id}'"))?;

    let Some(state) = state else {
        if json {
            println!("null");
        } else {
            println!();
            println!(
                "  {} No memory stored for '{}'.",
                style("i").blue().bold(),
                style(&user_id).cyan(),
            );
            println!();
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    print_overview(&state, &store.location(&user_id));

    if state.has_summary() {
        println!("  {}", style("Summary").bold());
        for line in state.summary.lines() {
            println!("    {}", style(line).dim());
        }
        println!();
    }

    if !state.reflections.is_empty() {
        println!("{}", reflection_table(&state.reflections, importance_threshold));
        println!(
            "  {} marks reflections injected into prompts (importance >= {importance_threshold})",
            style("*").yellow()
        );
        println!();
    }

    Ok(())
}

fn print_overview(state: &ConversationState, location: &str) {
    let active = state.active_turns().len();
    println!();
    println!("  Memory for '{}'", style(&state.user_id).cyan().bold());
    println!();
    println!("  {}  {}", style("File:").bold(), style(location).dim());
    println!(
        "  {}  {} ({} active, {} compacted)",
        style("Turns:").bold(),
        state.turn_count(),
        active,
        state.turn_count() - active,
    );
    println!(
        "  {}  ~{} tokens",
        style("Context:").bold(),
        state.context_size
    );
    println!(
        "  {}  {}",
        style("Reflections:").bold(),
        state.reflections.len()
    );
    println!();
}

fn reflection_table(reflections: &[Reflection], importance_threshold: u8) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Importance").fg(Color::White),
        Cell::new("Time").fg(Color::White),
        Cell::new("Reflection").fg(Color::White),
    ]);

    for (i, reflection) in reflections.iter().enumerate() {
        let injected = reflection.importance >= importance_threshold;
        let importance = if injected {
            Cell::new(format!("{} *", reflection.importance)).fg(Color::Yellow)
        } else {
            Cell::new(reflection.importance).fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            importance,
            Cell::new(reflection.timestamp.format("%Y-%m-%d %H:%M").to_string())
                .fg(Color::DarkGrey),
            Cell::new(preview(&reflection.content, PREVIEW_CHARS)).fg(Color::White),
        ]);
    }

    table
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}
