//! Context manager for one user's conversation memory.
//!
//! `ContextManager` records turns, keeps the estimated context size under
//! budget by folding older turns into a running summary, distills periodic
//! reflections, and assembles the prompt sent to the model.
//!
//! Mutating operations take `&mut self`; callers that share a manager wrap it
//! in a lock (see [`ManagerRegistry`](super::registry::ManagerRegistry)).

use std::sync::Arc;

use memochat_types::config::{CompactionPolicy, MemoryConfig};
use memochat_types::conversation::{
    ConversationState, DEFAULT_IMPORTANCE, Reflection, Turn, estimate_tokens,
};
use memochat_types::error::MemoryError;
use memochat_types::llm::{LlmError, MessageRole};

use super::budget::ContextBudget;
use super::completion::CompletionService;
use super::prompt::{BLOCK_SEPARATOR, build_prompt_context};
use super::store::ConversationStore;

/// Owns and evolves the memory of a single user.
pub struct ContextManager<C, S> {
    state: ConversationState,
    completion: Arc<C>,
    store: Arc<S>,
    config: MemoryConfig,
    /// Set once a load has completed, whether or not a snapshot existed.
    loaded: bool,
}

impl<C: CompletionService, S: ConversationStore> ContextManager<C, S> {
    /// Create a manager with an empty state for `user_id`.
    ///
    /// Nothing is read from the store until [`load`](Self::load) is called.
    pub fn new(
        user_id: impl Into<String>,
        completion: Arc<C>,
        store: Arc<S>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            state: ConversationState::new(user_id),
            completion,
            store,
            config,
            loaded: false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.state.user_id
    }

    /// Whether [`load`](Self::load) has succeeded on this manager.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Read-only view of the current state.
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Put back a state previously taken from [`state`](Self::state).
    ///
    /// Used by callers that record a user turn ahead of a model call and
    /// have to undo it when no reply arrives.
    pub fn restore(&mut self, snapshot: ConversationState) {
        tracing::debug!(
            user_id = %self.state.user_id,
            discarded = self.state.turn_count().saturating_sub(snapshot.turn_count()),
            "restoring earlier state"
        );
        self.state = snapshot;
    }

    /// The completion service this manager summarizes and reflects with.
    pub fn completion(&self) -> &Arc<C> {
        &self.completion
    }

    /// Where this user's snapshot lives, for display.
    pub fn location(&self) -> String {
        self.store.location(&self.state.user_id)
    }

    /// Append a turn, then apply the compaction and reflection policies.
    ///
    /// The turn is kept even when summarization fails; in that case the
    /// reflection check is skipped and `MemoryError::Summarize` returned.
    /// Reflection failures are logged and swallowed.
    ///
    /// Work happens on a staged copy of the state that replaces the live one
    /// only when the call completes, so dropping the future mid-way leaves
    /// the manager untouched.
    #[tracing::instrument(
        name = "record_turn",
        skip(self, role, content),
        fields(user_id = %self.state.user_id, role = %role)
    )]
    pub async fn record_turn(
        &mut self,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Result<(), MemoryError> {
        let turn = Turn::new(role, content);
        let mut staged = self.state.clone();
        staged.context_size += estimate_tokens(&turn.content);
        staged.messages.push(turn);

        let budget = ContextBudget::from_config(&self.config);
        if budget.should_summarize(staged.context_size) {
            tracing::debug!(
                context_size = staged.context_size,
                threshold = budget.summarize_threshold,
                "context over budget; summarizing"
            );
            if let Err(e) = summarize_state(&*self.completion, &self.config, &mut staged).await {
                self.state = staged;
                return Err(MemoryError::Summarize(e));
            }
        }

        let interval = self.config.reflection_interval;
        if interval > 0 && staged.turn_count() % interval == 0 {
            if let Err(e) = reflect_state(&*self.completion, &mut staged).await {
                tracing::warn!(
                    user_id = %staged.user_id,
                    error = %e,
                    "failed to generate reflection; continuing"
                );
            }
        }

        self.state = staged;
        Ok(())
    }

    /// Fold every active turn older than the `keep_recent` most recent ones
    /// into the running summary. On failure nothing changes.
    pub async fn summarize(&mut self) -> Result<(), MemoryError> {
        summarize_state(&*self.completion, &self.config, &mut self.state)
            .await
            .map_err(MemoryError::Summarize)
    }

    /// Generate one reflection over the active turns. On failure nothing changes.
    pub async fn reflect(&mut self) -> Result<(), MemoryError> {
        reflect_state(&*self.completion, &mut self.state)
            .await
            .map_err(MemoryError::Reflect)
    }

    /// The ordered prompt for the next model call. Pure and repeatable.
    pub fn build_prompt_context(&self) -> Vec<Turn> {
        build_prompt_context(&self.state, self.config.importance_threshold)
    }

    /// Replace the in-memory state with the stored snapshot, if one exists.
    ///
    /// A missing snapshot keeps the current (empty) state. The stored
    /// `context_size` is not trusted and is recomputed.
    pub async fn load(&mut self) -> Result<(), MemoryError> {
        match self.store.load(&self.state.user_id).await? {
            Some(mut snapshot) => {
                if snapshot.user_id != self.state.user_id {
                    tracing::warn!(
                        expected = %self.state.user_id,
                        found = %snapshot.user_id,
                        "stored snapshot names a different user; keeping requested id"
                    );
                    snapshot.user_id = self.state.user_id.clone();
                }
                snapshot.recompute_context_size();
                tracing::debug!(
                    user_id = %snapshot.user_id,
                    messages = snapshot.messages.len(),
                    reflections = snapshot.reflections.len(),
                    "loaded conversation"
                );
                self.state = snapshot;
            }
            None => {
                tracing::debug!(user_id = %self.state.user_id, "no stored conversation");
            }
        }
        self.loaded = true;
        Ok(())
    }

    /// Write the whole state to the store.
    pub async fn save(&self) -> Result<(), MemoryError> {
        self.store.save(&self.state).await?;
        Ok(())
    }
}

async fn summarize_state<C: CompletionService>(
    completion: &C,
    config: &MemoryConfig,
    state: &mut ConversationState,
) -> Result<(), LlmError> {
    let budget = ContextBudget::from_config(config);
    let (older, _) = budget.split_for_summary(state.active_turns());
    if older.is_empty() {
        return Ok(());
    }
    let folded = older.len();

    let summary = completion.summarize(older).await?;

    if state.summary.is_empty() {
        state.summary = summary;
    } else {
        state.summary.push_str(BLOCK_SEPARATOR);
        state.summary.push_str(&summary);
    }

    match config.compaction {
        CompactionPolicy::Destructive => {
            let start = state.summarized_through.min(state.messages.len());
            state.messages.drain(start..start + folded);
            state.dropped_turns += folded;
        }
        CompactionPolicy::Retain => {
            state.summarized_through += folded;
        }
    }
    state.recompute_context_size();

    tracing::info!(
        user_id = %state.user_id,
        folded,
        remaining = state.active_turns().len(),
        context_size = state.context_size,
        "summary generated"
    );
    Ok(())
}

async fn reflect_state<C: CompletionService>(
    completion: &C,
    state: &mut ConversationState,
) -> Result<(), LlmError> {
    let turns = state.active_turns();
    let Some(last) = turns.last() else {
        return Ok(());
    };
    let timestamp = last.timestamp;

    let draft = completion.generate_reflection(turns, &state.summary).await?;
    let importance = draft.importance.unwrap_or(i64::from(DEFAULT_IMPORTANCE));
    let reflection = Reflection::new(draft.content, timestamp, importance);

    tracing::info!(
        user_id = %state.user_id,
        importance = reflection.importance,
        "reflection generated"
    );
    state.reflections.push(reflection);
    Ok(())
}
