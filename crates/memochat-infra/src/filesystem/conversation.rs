//! YAML conversation store.
//!
//! One document per user at `{data_dir}/memories/{user_id}.yaml`. Every save
//! rewrites the whole document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use memochat_core::memory::registry::sanitize_user_id;
use memochat_core::memory::store::ConversationStore;
use memochat_types::conversation::ConversationState;
use memochat_types::error::StoreError;

/// Stores each user's `ConversationState` as a YAML file.
#[derive(Debug, Clone)]
pub struct YamlConversationStore {
    root: PathBuf,
}

impl YamlConversationStore {
    /// Store rooted at `{data_dir}/memories`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("memories"),
        }
    }

    /// Directory holding every user's document.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `user_id`. Unsafe ids collapse to one file.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.yaml", sanitize_user_id(user_id)))
    }
}

impl ConversationStore for YamlConversationStore {
    async fn load(&self, user_id: &str) -> Result<Option<ConversationState>, StoreError> {
        let path = self.path_for(user_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(err)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "empty conversation document");
            return Ok(None);
        }

        serde_yaml_ng::from_str::<ConversationState>(&content)
            .map(Some)
            .map_err(|e| StoreError::Malformed(format!("{}: {e}", path.display())))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), StoreError> {
        let path = self.path_for(&state.user_id);
        let yaml =
            serde_yaml_ng::to_string(state).map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash mid-write never truncates the document.
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(
            path = %path.display(),
            messages = state.messages.len(),
            "saved conversation"
        );
        Ok(())
    }

    fn location(&self, user_id: &str) -> String {
        self.path_for(user_id).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use memochat_types::conversation::{Reflection, Turn};
    use memochat_types::llm::MessageRole;
    use tempfile::TempDir;

    fn sample_state() -> ConversationState {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut state = ConversationState::new("alice");
        state.messages.push(Turn::at(MessageRole::User, "你好，我叫小明", at));
        state.messages.push(Turn::at(MessageRole::Assistant, "Hello!", at));
        state.summary = "Earlier small talk.".to_string();
        state.reflections.push(Reflection::new("Friendly user.", at, 8));
        state.recompute_context_size();
        state
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = YamlConversationStore::new(tmp.path());
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = YamlConversationStore::new(tmp.path());
        let state = sample_state();

        store.save(&state).await.unwrap();
        assert!(tmp.path().join("memories").join("alice.yaml").exists());
        assert!(!tmp.path().join("memories").join("alice.yaml.tmp").exists());

        let loaded = store.load("alice").await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = YamlConversationStore::new(tmp.path());
        let mut state = sample_state();
        store.save(&state).await.unwrap();

        state.messages.clear();
        state.summary.clear();
        store.save(&state).await.unwrap();

        let loaded = store.load("alice").await.unwrap().unwrap();
        assert!(loaded.messages.is_empty());
        assert_eq!(loaded.reflections.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let tmp = TempDir::new().unwrap();
        let store = YamlConversationStore::new(tmp.path());
        let path = store.path_for("bob");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "user_id: [unclosed").await.unwrap();

        let err = store.load("bob").await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_legacy_document_without_cursors() {
        let tmp = TempDir::new().unwrap();
        let store = YamlConversationStore::new(tmp.path());
        let path = store.path_for("carol");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(
            &path,
            r#"user_id: carol
messages:
    - role: user
      content: hi
      timestamp: 2024-05-01T10:00:00.5+08:00
summary: ""
reflections:
    - content: curious
      timestamp: 2024-05-01T10:00:00+08:00
      importance: 12
context_size: 0
"#,
        )
        .await
        .unwrap();

        let loaded = store.load("carol").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.reflections[0].importance, 10);
        assert_eq!(loaded.summarized_through, 0);
    }

    #[tokio::test]
    async fn test_empty_document_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = YamlConversationStore::new(tmp.path());
        let path = store.path_for("dave");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "\n").await.unwrap();
        assert!(store.load("dave").await.unwrap().is_none());
    }

    #[test]
    fn test_path_for_sanitizes() {
        let store = YamlConversationStore::new(Path::new("/data"));
        assert_eq!(
            store.path_for("alice"),
            PathBuf::from("/data/memories/alice.yaml")
        );
        assert_eq!(
            store.path_for("../../etc/passwd"),
            PathBuf::from("/data/memories/invalid_user.yaml")
        );
        assert_eq!(store.location("alice"), "/data/memories/alice.yaml");
    }
}
