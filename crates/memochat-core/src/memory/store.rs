//! ConversationStore trait definition.
//!
//! Whole-snapshot persistence for one user's `ConversationState`. Follows
//! the same RPITIT pattern as `CompletionService`.

use std::collections::HashMap;
use std::sync::Mutex;

use memochat_types::conversation::ConversationState;
use memochat_types::error::StoreError;

/// Durable storage for conversation snapshots.
///
/// Implementations live in memochat-infra (e.g., `YamlConversationStore`).
pub trait ConversationStore: Send + Sync {
    /// Load the snapshot for `user_id`. `Ok(None)` when none exists yet.
    fn load(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationState>, StoreError>> + Send;

    /// Overwrite the snapshot for `state.user_id`.
    fn save(
        &self,
        state: &ConversationState,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Human-readable location of the snapshot, for display.
    fn location(&self, user_id: &str) -> String;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    snapshots: Mutex<HashMap<String, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a saved snapshot.
    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
        Ok(snapshots.get(user_id).cloned())
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
        snapshots.insert(state.user_id.clone(), state.clone());
        Ok(())
    }

    fn location(&self, user_id: &str) -> String {
        format!("memory://{user_id}")
    }
}
