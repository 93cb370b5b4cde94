//! Terminal output for the chat loop.
//!
//! `ChatRenderer` combines `termimad` for prose and `syntect` for code block
//! syntax highlighting. Replies are streamed raw token by token; stored
//! markdown (the summary) is rendered in full.

use std::io::Write;

use console::style;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Style, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::as_24_bit_terminal_escaped;
use termimad::MadSkin;

use memochat_types::conversation::{ConversationState, Reflection};

/// Terminal markdown renderer with syntax highlighting.
pub struct ChatRenderer {
    skin: MadSkin,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl ChatRenderer {
    pub fn new() -> Self {
        let mut skin = MadSkin::default_dark();
        skin.bold.set_fg(termimad::crossterm::style::Color::Cyan);
        skin.headers[0].set_fg(termimad::crossterm::style::Color::Cyan);
        skin.inline_code
            .set_fg(termimad::crossterm::style::Color::Yellow);

        Self {
            skin,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Render complete markdown with syntax-highlighted code blocks.
    ///
    /// Code fences are highlighted via syntect; everything else is rendered
    /// through termimad.
    pub fn render_final(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut in_code_block = false;
        let mut code_lang = String::new();
        let mut code_buf = String::new();

        for line in markdown.lines() {
            if line.starts_with("```") && !in_code_block {
                in_code_block = true;
                code_lang = line.trim_start_matches('`').trim().to_string();
                code_buf.clear();
            } else if line.starts_with("```") && in_code_block {
                in_code_block = false;
                output.push_str(&self.highlight_code(&code_buf, &code_lang));
                output.push('\n');
            } else if in_code_block {
                code_buf.push_str(line);
                code_buf.push('\n');
            } else {
                output.push_str(&self.skin.term_text(line).to_string());
            }
        }

        // Unclosed fence
        if in_code_block && !code_buf.is_empty() {
            output.push_str(&self.highlight_code(&code_buf, &code_lang));
        }

        output
    }

    /// Print a single streaming token (raw, no formatting).
    pub fn print_streaming_token(&self, token: &str) {
        print!("{token}");
        let _ = std::io::stdout().flush();
    }

    /// Print the stats footer after a reply.
    ///
    /// Format: "| {tokens} tokens . {time}s . {model}"
    pub fn print_stats_footer(&self, tokens: u32, response_ms: u64, model: &str) {
        let seconds = response_ms as f64 / 1000.0;
        println!(
            "\n  {} {} tokens {} {:.1}s {} {}",
            style("|").dim(),
            style(tokens).dim(),
            style("\u{00b7}").dim(),
            style(seconds).dim(),
            style("\u{00b7}").dim(),
            style(model).dim(),
        );
    }

    /// `/memory`: counters for the current state.
    pub fn print_memory_stats(&self, state: &ConversationState) {
        println!();
        println!("  {}", style("Memory").bold());
        println!("  {}  {}", style("User:").bold(), state.user_id);
        println!("  {}  {}", style("Turns:").bold(), state.turn_count());
        println!(
            "  {}  {}",
            style("Reflections:").bold(),
            state.reflections.len()
        );
        println!(
            "  {}  ~{} tokens",
            style("Context:").bold(),
            state.context_size
        );
        println!(
            "  {}  {}",
            style("Summary:").bold(),
            if state.has_summary() { "yes" } else { "no" }
        );
        println!();
    }

    /// `/summary`: the running summary, rendered as markdown.
    pub fn print_summary(&self, state: &ConversationState) {
        println!();
        if !state.has_summary() {
            println!("  {}", style("No summary yet.").dim());
            println!();
            return;
        }
        println!("  {}", style("Summary").bold());
        println!("  {}", style("-".repeat(60)).dim());
        println!("{}", self.render_final(&state.summary).trim_end());
        println!("  {}", style("-".repeat(60)).dim());
        println!();
    }

    /// `/reflections`: every reflection with its importance and time.
    pub fn print_reflections(&self, reflections: &[Reflection]) {
        println!();
        if reflections.is_empty() {
            println!("  {}", style("No reflections yet.").dim());
            println!();
            return;
        }
        println!("  {} ({})", style("Reflections").bold(), reflections.len());
        println!();
        for line in reflection_lines(reflections) {
            println!("{line}");
        }
        println!();
    }

    fn highlight_code(&self, code: &str, lang: &str) -> String {
        let syntax = if lang.is_empty() {
            self.syntax_set.find_syntax_plain_text()
        } else {
            self.syntax_set
                .find_syntax_by_token(lang)
                .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text())
        };

        let Some(theme) = self.theme_set.themes.get("base16-ocean.dark") else {
            return code.to_string();
        };
        let mut h = HighlightLines::new(syntax, theme);

        let mut output = String::new();
        output.push_str(&format!("  {}\n", style(format!("--- {lang} ---")).dim()));

        for line in code.lines() {
            let ranges: Vec<(Style, &str)> = h
                .highlight_line(line, &self.syntax_set)
                .unwrap_or_default();
            let escaped = as_24_bit_terminal_escaped(&ranges[..], false);
            output.push_str(&format!("  {escaped}\x1b[0m\n"));
        }

        output
    }
}

impl Default for ChatRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain-text lines for the reflection listing: index, importance, RFC 3339
/// time, then the content indented underneath.
fn reflection_lines(reflections: &[Reflection]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, reflection) in reflections.iter().enumerate() {
        lines.push(format!(
            "  {}. [importance {}] {}",
            i + 1,
            reflection.importance,
            reflection.timestamp.to_rfc3339(),
        ));
        for content_line in reflection.content.lines() {
            lines.push(format!("     {content_line}"));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_reflection_lines() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let reflections = vec![
            Reflection::new("likes Rust\nprefers examples", ts, 8),
            Reflection::new("asked about lifetimes", ts, 4),
        ];
        let lines = reflection_lines(&reflections);
        assert_eq!(lines[0], "  1. [importance 8] 2024-05-01T10:00:00+00:00");
        assert_eq!(lines[1], "     likes Rust");
        assert_eq!(lines[2], "     prefers examples");
        assert!(lines[3].starts_with("  2. [importance 4]"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_render_final_highlights_code() {
        let renderer = ChatRenderer::new();
        let out = renderer.render_final("Intro\n```rust\nfn main() {}\n```\n");
        assert!(out.contains("--- rust ---"));
        assert!(out.contains("\x1b[0m"));
    }
}
