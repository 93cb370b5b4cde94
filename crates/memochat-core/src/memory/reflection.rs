//! Reflection response parsing.
//!
//! The reflection prompt asks the model to open its reply with an importance
//! marker such as `[重要性:8]`. The marker is optional in practice: models
//! forget it, translate it, or pad it with spaces.

use memochat_types::conversation::ReflectionDraft;

/// Marker labels accepted before the score, compared case-insensitively.
const MARKER_LABELS: &[&str] = &["重要性", "importance"];

/// Split a raw reflection reply into content and an optional importance.
///
/// When the first line is a well-formed marker, the marker is removed and the
/// score returned unclamped; text after it on the same line is kept. Otherwise the reply is kept verbatim with no
/// score.
pub fn parse_reflection_response(raw: &str) -> ReflectionDraft {
    let (first_line, rest) = match raw.split_once('\n') {
        Some((first, rest)) => (first, Some(rest)),
        None => (raw, None),
    };

    match parse_marker(first_line) {
        Some((importance, trailing)) => {
            let trailing = trailing.trim();
            let rest = rest.map(str::trim).unwrap_or_default();
            let content = match (trailing.is_empty(), rest.is_empty()) {
                (_, true) => trailing.to_string(),
                (true, false) => rest.to_string(),
                (false, false) => format!("{trailing}\n{rest}"),
            };
            ReflectionDraft {
                content,
                importance: Some(importance),
            }
        }
        None => ReflectionDraft {
            content: raw.to_string(),
            importance: None,
        },
    }
}

/// Parse `[label:N]` at the start of `line`, returning the score and
/// whatever follows the closing bracket.
fn parse_marker(line: &str) -> Option<(i64, &str)> {
    let inner = line.trim_start().strip_prefix('[')?;
    let (inner, trailing) = inner.split_once(']')?;
    let (label, score) = inner.split_once([':', '：'])?;

    let label = label.trim();
    if !MARKER_LABELS
        .iter()
        .any(|known| label.eq_ignore_ascii_case(known))
    {
        return None;
    }

    let score = score.trim().parse::<i64>().ok()?;
    Some((score, trailing))
}
