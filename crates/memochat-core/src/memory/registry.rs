//! Per-user manager registry.
//!
//! Maps a sanitized user id to its `ContextManager`, one async mutex per
//! user, so requests for the same user are serialized while different users
//! proceed in parallel. DashMap guards are never held across `.await`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use memochat_types::config::MemoryConfig;
use memochat_types::error::MemoryError;

use super::completion::CompletionService;
use super::manager::ContextManager;
use super::store::ConversationStore;

/// User id substituted for ids that could escape the storage directory.
pub const INVALID_USER_ID: &str = "invalid_user";

/// Exclusive access to one user's manager. Dropping it releases the user.
pub type ManagerGuard<C, S> = OwnedMutexGuard<ContextManager<C, S>>;

/// Neutralize ids that are empty or contain path separators or traversal.
pub fn sanitize_user_id(user_id: &str) -> String {
    let suspicious = user_id.is_empty()
        || user_id == "."
        || user_id.contains("..")
        || user_id.contains('/')
        || user_id.contains('\\')
        || user_id.contains('\0');
    if suspicious {
        INVALID_USER_ID.to_string()
    } else {
        user_id.to_string()
    }
}

/// Lazily-populated map of context managers sharing one completion service
/// and one store.
pub struct ManagerRegistry<C, S> {
    managers: DashMap<String, Arc<Mutex<ContextManager<C, S>>>>,
    completion: Arc<C>,
    store: Arc<S>,
    config: MemoryConfig,
}

impl<C: CompletionService, S: ConversationStore> ManagerRegistry<C, S> {
    pub fn new(completion: Arc<C>, store: Arc<S>, config: MemoryConfig) -> Self {
        Self {
            managers: DashMap::new(),
            completion,
            store,
            config,
        }
    }

    /// Number of users with a manager in memory.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Lock the manager for `user_id`, loading it from the store on first use.
    ///
    /// A load failure is returned and the manager stays unloaded, so the next
    /// acquisition retries instead of overwriting the stored document with an
    /// empty state.
    pub async fn acquire(&self, user_id: &str) -> Result<ManagerGuard<C, S>, MemoryError> {
        let key = sanitize_user_id(user_id);
        if key != user_id {
            tracing::warn!(requested = %user_id, "rejected unsafe user id");
        }

        let slot = self
            .managers
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(user_id = %key, "creating context manager");
                Arc::new(Mutex::new(ContextManager::new(
                    key.clone(),
                    self.completion.clone(),
                    self.store.clone(),
                    self.config.clone(),
                )))
            })
            .clone();

        let mut guard = slot.lock_owned().await;
        if !guard.is_loaded() {
            guard.load().await?;
        }
        Ok(guard)
    }

    /// Save every manager that is not currently in use.
    ///
    /// Managers locked by an in-flight request are skipped; their owner saves
    /// them. A failed save is logged and does not stop the others. Returns
    /// the number of snapshots written.
    pub async fn save_idle(&self) -> usize {
        let slots: Vec<_> = self.managers.iter().map(|e| e.value().clone()).collect();
        let mut saved = 0;
        for slot in slots {
            let Ok(manager) = slot.try_lock() else {
                continue;
            };
            if !manager.is_loaded() {
                continue;
            }
            match manager.save().await {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::warn!(user_id = %manager.user_id(), error = %e, "failed to save memory");
                }
            }
        }
        saved
    }
}
