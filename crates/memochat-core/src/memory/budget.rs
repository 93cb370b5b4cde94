//! Context budget policy.
//!
//! Decides when the running context is large enough to summarize, and which
//! turns get folded into the summary versus kept verbatim.

use memochat_types::config::MemoryConfig;
use memochat_types::conversation::Turn;

pub use memochat_types::conversation::estimate_tokens;

/// Thresholds that govern compaction of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Summarize once the context size strictly exceeds this.
    pub summarize_threshold: usize,
    /// Most recent turns that always stay verbatim.
    pub keep_recent: usize,
}

impl ContextBudget {
    pub fn new(summarize_threshold: usize, keep_recent: usize) -> Self {
        Self {
            summarize_threshold,
            keep_recent,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.summarize_threshold, config.keep_recent)
    }

    /// Whether a context of `context_size` units should be summarized.
    pub fn should_summarize(&self, context_size: usize) -> bool {
        context_size > self.summarize_threshold
    }

    /// Split turns into `(to_summarize, to_keep)`.
    ///
    /// `to_keep` holds the most recent `keep_recent` turns and `to_summarize`
    /// everything before them. With `keep_recent` or fewer turns there is
    /// nothing to summarize.
    pub fn split_for_summary<'a>(&self, turns: &'a [Turn]) -> (&'a [Turn], &'a [Turn]) {
        if turns.len() <= self.keep_recent {
            (&[], turns)
        } else {
            turns.split_at(turns.len() - self.keep_recent)
        }
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}
