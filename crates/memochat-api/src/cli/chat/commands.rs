//! Slash command parsing for the chat loop.
//!
//! Commands start with `/`. Plain `quit` and `exit` are also accepted.

use console::style;

/// Available commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Clear the terminal screen.
    Clear,
    /// Show memory statistics for the current user.
    Memory,
    /// Print the running summary.
    Summary,
    /// List recorded reflections.
    Reflections,
    /// Save and exit the chat session.
    Exit,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a command.
///
/// Returns `None` for ordinary chat input.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        return Some(ChatCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return None;
    }

    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_lowercase();

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/memory" | "/mem" => Some(ChatCommand::Memory),
        "/summary" => Some(ChatCommand::Summary),
        "/reflections" | "/ref" => Some(ChatCommand::Reflections),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    println!("  {}         {}", style("/help").cyan(), "Show this help message");
    println!("  {}        {}", style("/clear").cyan(), "Clear the screen");
    println!("  {}       {}", style("/memory").cyan(), "Show memory statistics");
    println!("  {}      {}", style("/summary").cyan(), "Show the conversation summary");
    println!("  {}  {}", style("/reflections").cyan(), "List recorded reflections");
    println!("  {}         {}", style("/exit").cyan(), "Save memory and exit");
    println!();
    println!(
        "  {}",
        style("Ctrl+D to exit; memory is saved after every reply").dim()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_help() {
        assert_eq!(parse("/help"), Some(ChatCommand::Help));
        assert_eq!(parse("/h"), Some(ChatCommand::Help));
        assert_eq!(parse("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn test_parse_exit() {
        assert_eq!(parse("/exit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/quit"), Some(ChatCommand::Exit));
        assert_eq!(parse("/q"), Some(ChatCommand::Exit));
        assert_eq!(parse("quit"), Some(ChatCommand::Exit));
        assert_eq!(parse("  EXIT "), Some(ChatCommand::Exit));
    }

    #[test]
    fn test_parse_memory_views() {
        assert_eq!(parse("/memory"), Some(ChatCommand::Memory));
        assert_eq!(parse("/mem"), Some(ChatCommand::Memory));
        assert_eq!(parse("/summary"), Some(ChatCommand::Summary));
        assert_eq!(parse("/Reflections"), Some(ChatCommand::Reflections));
    }

    #[test]
    fn test_parse_clear() {
        assert_eq!(parse("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse("/cls"), Some(ChatCommand::Clear));
    }

    #[test]
    fn test_parse_not_command() {
        assert_eq!(parse("hello world"), None);
        // Only the bare words are commands.
        assert_eq!(parse("exit strategy ideas?"), None);
        assert_eq!(parse("memory"), None);
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse("/foo bar"), Some(ChatCommand::Unknown("/foo".to_string())));
    }
}
