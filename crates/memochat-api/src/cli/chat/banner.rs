//! Welcome banner display for chat sessions.

use console::style;

use memochat_types::conversation::ConversationState;

/// Print the welcome banner at the start of a chat session.
///
/// Shows the model, the user, where memory is stored and what was restored
/// from it.
pub fn print_welcome_banner(model: &str, state: &ConversationState, location: &str) {
    println!();
    println!("  * {}", style("memochat").cyan().bold());
    println!("  {}", style("Conversations that remember").dim());
    println!();
    println!("  {}   {}", style("Model:").bold(), style(model).dim());
    println!("  {}    {}", style("User:").bold(), style(&state.user_id).dim());
    println!("  {}  {}", style("Memory:").bold(), style(location).dim());

    if let Some(restored) = restored_line(state) {
        println!();
        println!("  {} {}", style("✓").green(), restored);
    }

    println!();
    println!(
        "  {}",
        style("Type /help for commands, Ctrl+D to exit").dim()
    );
    println!("  {}", style("---").dim());
    println!();
}

/// What was loaded from disk, or `None` for a fresh user.
fn restored_line(state: &ConversationState) -> Option<String> {
    if state.is_empty() {
        return None;
    }
    let mut line = format!(
        "Restored {} turns and {} reflections",
        state.turn_count(),
        state.reflections.len()
    );
    if state.has_summary() {
        line.push_str(", with a summary of earlier conversation");
    }
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memochat_types::conversation::Turn;

    #[test]
    fn test_restored_line() {
        let mut state = ConversationState::new("alice");
        assert_eq!(restored_line(&state), None);

        state.messages.push(Turn::user("hi"));
        state.dropped_turns = 4;
        assert_eq!(
            restored_line(&state).as_deref(),
            Some("Restored 5 turns and 0 reflections")
        );

        state.summary = "earlier".to_string();
        assert!(restored_line(&state).unwrap().ends_with("summary of earlier conversation"));
    }
}
