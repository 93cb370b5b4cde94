//! Global configuration types for memochat.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! memory policy, the upstream LLM provider, and the HTTP server.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.memochat/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

/// What happens to turns once they have been folded into the summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionPolicy {
    /// Summarized turns are removed. Storage stays bounded, raw history is lost.
    #[default]
    Destructive,
    /// Summarized turns stay on disk behind a cursor. Full audit trail,
    /// unbounded storage.
    Retain,
}

/// Memory policy for every context manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Summarize once the estimated context exceeds this many budget units.
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// Most recent turns kept verbatim when summarizing.
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Generate a reflection every N recorded turns. `0` disables reflections.
    #[serde(default = "default_reflection_interval")]
    pub reflection_interval: usize,

    /// Reflections at or above this importance are injected into prompts.
    #[serde(default = "default_importance_threshold")]
    pub importance_threshold: u8,

    #[serde(default)]
    pub compaction: CompactionPolicy,
}

fn default_summarize_threshold() -> usize {
    1500
}

fn default_keep_recent() -> usize {
    5
}

fn default_reflection_interval() -> usize {
    5
}

fn default_importance_threshold() -> u8 {
    7
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summarize_threshold: default_summarize_threshold(),
            keep_recent: default_keep_recent(),
            reflection_interval: default_reflection_interval(),
            importance_threshold: default_importance_threshold(),
            compaction: CompactionPolicy::default(),
        }
    }
}

/// Upstream OpenAI-compatible endpoint settings.
///
/// The API key is deliberately absent: it comes from the environment only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.summarize_threshold, 1500);
        assert_eq!(config.keep_recent, 5);
        assert_eq!(config.reflection_interval, 5);
        assert_eq!(config.importance_threshold, 7);
        assert_eq!(config.compaction, CompactionPolicy::Destructive);
    }

    #[test]
    fn test_global_config_deserialize_empty() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
        assert_eq!(config.provider.model, "gpt-3.5-turbo");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_global_config_deserialize_partial() {
        let toml_str = r#"
[memory]
reflection_interval = 10
compaction = "retain"

[provider]
model = "gpt-4o-mini"
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.reflection_interval, 10);
        assert_eq!(config.memory.compaction, CompactionPolicy::Retain);
        assert_eq!(config.memory.keep_recent, 5);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
    }
}
