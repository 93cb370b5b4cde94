//! Conversation memory types.
//!
//! A [`ConversationState`] is the aggregate root for one user's memory: the
//! ordered turns still considered verbatim history, the running summary of
//! older turns, and the reflections distilled along the way. Its serialized
//! shape is the on-disk document format, so field names are a durable
//! contract.

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::llm::{Message, MessageRole};

/// Lowest importance a reflection can carry.
pub const MIN_IMPORTANCE: u8 = 1;

/// Highest importance a reflection can carry.
pub const MAX_IMPORTANCE: u8 = 10;

/// Importance used when a reflection response carries no usable score.
pub const DEFAULT_IMPORTANCE: u8 = 5;

/// Bytes per budget unit in the context size heuristic.
pub const BYTES_PER_TOKEN: usize = 4;

/// Approximate token cost of a piece of text.
///
/// A byte-length heuristic, not a tokenizer: `len / 4`, rounded down.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / BYTES_PER_TOKEN
}

/// One role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a turn with an explicit timestamp.
    pub fn at(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// Shorthand for a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Shorthand for an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Drop the timestamp, keeping what an LLM provider needs.
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A derived, importance-scored insight about the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(
        default = "default_importance",
        deserialize_with = "deserialize_importance"
    )]
    pub importance: u8,
}

impl Reflection {
    /// Create a reflection, clamping `importance` into `1..=10`.
    pub fn new(content: impl Into<String>, timestamp: DateTime<Utc>, importance: i64) -> Self {
        Self {
            content: content.into(),
            timestamp,
            importance: clamp_importance(importance),
        }
    }
}

/// Clamp an arbitrary score into the valid importance range.
pub fn clamp_importance(raw: i64) -> u8 {
    raw.clamp(i64::from(MIN_IMPORTANCE), i64::from(MAX_IMPORTANCE)) as u8
}

fn default_importance() -> u8 {
    DEFAULT_IMPORTANCE
}

/// Accept any integer from a persisted document and clamp it; anything
/// non-numeric falls back to the default rather than failing the load.
fn deserialize_importance<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawImportance {
        Int(i64),
        Float(f64),
        Other(IgnoredAny),
    }

    Ok(match RawImportance::deserialize(deserializer)? {
        RawImportance::Int(n) => clamp_importance(n),
        RawImportance::Float(f) if f.is_finite() => clamp_importance(f.round() as i64),
        RawImportance::Float(_) | RawImportance::Other(IgnoredAny) => DEFAULT_IMPORTANCE,
    })
}

/// What a completion service hands back when asked for a reflection.
///
/// `importance` is whatever score could be parsed from the response, not
/// yet range-checked. `None` means no usable marker was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionDraft {
    pub content: String,
    pub importance: Option<i64>,
}

/// A full (non-streaming) chat reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: Turn,
    pub total_tokens: u32,
}

/// Incremental output of a streaming chat call.
///
/// A well-formed stream yields zero or more `Delta`s followed by exactly one
/// `Finished`. A stream that ends without `Finished` was cut short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatStreamEvent {
    Delta(String),
    Finished { total_tokens: u32 },
}

/// The complete memory of one user's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: String,

    /// Turns in append order. Under the retaining compaction policy the
    /// prefix before `summarized_through` is already folded into `summary`.
    #[serde(default)]
    pub messages: Vec<Turn>,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub reflections: Vec<Reflection>,

    /// Approximate token usage of the summary plus the active turns.
    #[serde(default)]
    pub context_size: usize,

    /// Index of the first turn not yet folded into the summary.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub summarized_through: usize,

    /// Turns removed from `messages` by destructive compaction.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub dropped_turns: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl ConversationState {
    /// Fresh, empty state for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
            summary: String::new(),
            reflections: Vec::new(),
            context_size: 0,
            summarized_through: 0,
            dropped_turns: 0,
        }
    }

    /// Turns that still count as verbatim history.
    pub fn active_turns(&self) -> &[Turn] {
        let start = self.summarized_through.min(self.messages.len());
        &self.messages[start..]
    }

    /// Number of turns ever recorded, including ones compacted away.
    pub fn turn_count(&self) -> usize {
        self.dropped_turns + self.messages.len()
    }

    /// Recompute `context_size` from the summary and the active turns.
    pub fn recompute_context_size(&mut self) -> usize {
        self.context_size = estimate_tokens(&self.summary)
            + self
                .active_turns()
                .iter()
                .map(|t| estimate_tokens(&t.content))
                .sum::<usize>();
        self.context_size
    }

    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.summary.is_empty() && self.reflections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflection_new_clamps() {
        let now = Utc::now();
        assert_eq!(Reflection::new("a", now, 42).importance, 10);
        assert_eq!(Reflection::new("a", now, -3).importance, 1);
        assert_eq!(Reflection::new("a", now, 0).importance, 1);
        assert_eq!(Reflection::new("a", now, 7).importance, 7);
    }

    #[test]
    fn test_active_turns_respects_cursor() {
        let mut state = ConversationState::new("alice");
        for i in 0..4 {
            state.messages.push(Turn::user(format!("m{i}")));
        }
        assert_eq!(state.active_turns().len(), 4);

        state.summarized_through = 3;
        assert_eq!(state.active_turns().len(), 1);
        assert_eq!(state.active_turns()[0].content, "m3");

        // A cursor past the end never panics.
        state.summarized_through = 99;
        assert!(state.active_turns().is_empty());
    }

    #[test]
    fn test_estimate_tokens_floors() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
        // Byte length, so multi-byte characters cost more.
        assert_eq!(estimate_tokens("你好"), 1);
    }

    #[test]
    fn test_recompute_context_size_counts_active_only() {
        let mut state = ConversationState::new("frank");
        state.summary = "s".repeat(40);
        state.messages.push(Turn::user("a".repeat(80)));
        state.messages.push(Turn::assistant("b".repeat(8)));
        assert_eq!(state.recompute_context_size(), 10 + 20 + 2);

        state.summarized_through = 1;
        assert_eq!(state.recompute_context_size(), 10 + 2);
        assert_eq!(state.context_size, 12);
    }

    #[test]
    fn test_turn_count_includes_dropped() {
        let mut state = ConversationState::new("bob");
        state.messages.push(Turn::user("hi"));
        state.dropped_turns = 9;
        assert_eq!(state.turn_count(), 10);
    }

    #[test]
    fn test_deserialize_minimal_document() {
        let yaml = r#"
user_id: carol
messages:
  - role: user
    content: hello
    timestamp: 2024-05-01T10:00:00.123456789+08:00
summary: ""
reflections: []
context_size: 1
"#;
        let state: ConversationState = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(state.user_id, "carol");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, MessageRole::User);
        assert_eq!(state.summarized_through, 0);
        assert_eq!(state.dropped_turns, 0);
    }

    #[test]
    fn test_deserialize_out_of_range_importance() {
        let yaml = r#"
user_id: dave
reflections:
  - content: too big
    timestamp: 2024-05-01T10:00:00Z
    importance: 99
  - content: negative
    timestamp: 2024-05-01T10:00:00Z
    importance: -4
  - content: garbage
    timestamp: 2024-05-01T10:00:00Z
    importance: "very"
  - content: nested
    timestamp: 2024-05-01T10:00:00Z
    importance: { score: 9 }
  - content: fractional
    timestamp: 2024-05-01T10:00:00Z
    importance: 7.6
  - content: missing
    timestamp: 2024-05-01T10:00:00Z
"#;
        let state: ConversationState = serde_yaml_ng::from_str(yaml).unwrap();
        let scores: Vec<u8> = state.reflections.iter().map(|r| r.importance).collect();
        assert_eq!(
            scores,
            vec![10, 1, DEFAULT_IMPORTANCE, DEFAULT_IMPORTANCE, 8, DEFAULT_IMPORTANCE]
        );
    }

    #[test]
    fn test_serialize_omits_zero_cursors() {
        let state = ConversationState::new("erin");
        let yaml = serde_yaml_ng::to_string(&state).unwrap();
        assert!(yaml.contains("user_id: erin"));
        assert!(yaml.contains("context_size: 0"));
        assert!(!yaml.contains("summarized_through"));
        assert!(!yaml.contains("dropped_turns"));
    }
}
