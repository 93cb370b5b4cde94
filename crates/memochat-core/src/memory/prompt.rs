//! Prompt assembly.
//!
//! Turns a `ConversationState` into the ordered message list sent to the
//! model: the running summary, the important reflections, then the verbatim
//! turns. Assembly is a pure function of the state.

use chrono::{DateTime, Utc};

use memochat_types::conversation::{ConversationState, Reflection, Turn};
use memochat_types::llm::MessageRole;

/// Label placed before the running summary.
pub const SUMMARY_PREFIX: &str = "以下是之前对话的摘要：\n";

/// Label placed before the important reflections.
pub const REFLECTION_PREFIX: &str = "重要反思和观察：\n";

/// Separator between joined summaries and reflections.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Assemble the prompt context for `state`.
///
/// Reflections below `importance_threshold` are left out.
pub fn build_prompt_context(state: &ConversationState, importance_threshold: u8) -> Vec<Turn> {
    let active = state.active_turns();
    let mut prompt = Vec::with_capacity(active.len() + 2);

    if state.has_summary() {
        let timestamp = active
            .first()
            .map(|t| t.timestamp)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        prompt.push(Turn::at(
            MessageRole::System,
            format!("{SUMMARY_PREFIX}{}", state.summary),
            timestamp,
        ));
    }

    let important: Vec<&Reflection> = state
        .reflections
        .iter()
        .filter(|r| r.importance >= importance_threshold)
        .collect();

    if !important.is_empty() {
        let body = important
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);
        let timestamp = important
            .iter()
            .map(|r| r.timestamp)
            .max()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        prompt.push(Turn::at(
            MessageRole::System,
            format!("{REFLECTION_PREFIX}{body}"),
            timestamp,
        ));
    }

    prompt.extend(active.iter().cloned());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn state_with_turns(n: usize) -> ConversationState {
        let mut state = ConversationState::new("alice");
        for i in 0..n {
            state
                .messages
                .push(Turn::at(MessageRole::User, format!("m{i}"), ts(100 + i as i64)));
        }
        state
    }

    #[test]
    fn test_empty_state_yields_empty_prompt() {
        let state = ConversationState::new("alice");
        assert!(build_prompt_context(&state, 7).is_empty());
    }

    #[test]
    fn test_turns_only() {
        let state = state_with_turns(3);
        let prompt = build_prompt_context(&state, 7);
        assert_eq!(prompt, state.messages);
    }

    #[test]
    fn test_summary_first_then_turns() {
        let mut state = state_with_turns(2);
        state.summary = "They talked about Rust.".to_string();

        let prompt = build_prompt_context(&state, 7);
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0].role, MessageRole::System);
        assert_eq!(prompt[0].content, format!("{SUMMARY_PREFIX}They talked about Rust."));
        assert_eq!(prompt[0].timestamp, ts(100));
        assert_eq!(&prompt[1..], &state.messages[..]);
    }

    #[test]
    fn test_reflection_threshold_filters() {
        let mut state = state_with_turns(1);
        state.reflections = vec![
            Reflection::new("low", ts(1), 3),
            Reflection::new("edge", ts(2), 7),
            Reflection::new("high", ts(3), 9),
            Reflection::new("six", ts(4), 6),
        ];

        let prompt = build_prompt_context(&state, 7);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, MessageRole::System);
        assert_eq!(prompt[0].content, format!("{REFLECTION_PREFIX}edge\n\nhigh"));
        assert_eq!(prompt[0].timestamp, ts(3));
        assert_eq!(prompt[1].content, "m0");
    }

    #[test]
    fn test_no_important_reflections_no_block() {
        let mut state = state_with_turns(1);
        state.reflections = vec![Reflection::new("minor", ts(1), 4)];
        let prompt = build_prompt_context(&state, 7);
        assert_eq!(prompt.len(), 1);
        assert_eq!(prompt[0].role, MessageRole::User);
    }

    #[test]
    fn test_full_ordering() {
        let mut state = state_with_turns(2);
        state.summary = "S".to_string();
        state.reflections = vec![Reflection::new("R", ts(5), 8)];

        let prompt = build_prompt_context(&state, 7);
        let contents: Vec<String> = prompt.into_iter().map(|t| t.content).collect();
        assert_eq!(
            contents,
            vec![
                format!("{SUMMARY_PREFIX}S"),
                format!("{REFLECTION_PREFIX}R"),
                "m0".to_string(),
                "m1".to_string(),
            ]
        );
    }

    #[test]
    fn test_retained_turns_are_excluded() {
        let mut state = state_with_turns(4);
        state.summary = "S".to_string();
        state.summarized_through = 3;

        let prompt = build_prompt_context(&state, 7);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].timestamp, ts(103));
        assert_eq!(prompt[1].content, "m3");
    }

    #[test]
    fn test_summary_without_turns_uses_epoch() {
        let mut state = ConversationState::new("alice");
        state.summary = "S".to_string();
        let prompt = build_prompt_context(&state, 7);
        assert_eq!(prompt[0].timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_idempotent() {
        let mut state = state_with_turns(3);
        state.summary = "S".to_string();
        state.reflections = vec![Reflection::new("R", ts(9), 10)];
        assert_eq!(build_prompt_context(&state, 7), build_prompt_context(&state, 7));
    }
}
