//! Application state wiring.
//!
//! Builds the completion service, the conversation store and the manager
//! registry from config.toml plus CLI overrides. `AppState` is cheap to
//! clone and is shared across axum handlers.

use std::path::Path;
use std::sync::Arc;

use secrecy::SecretString;

use memochat_core::llm::box_provider::BoxLlmProvider;
use memochat_core::memory::registry::ManagerRegistry;
use memochat_infra::filesystem::conversation::YamlConversationStore;
use memochat_infra::llm::completion::LlmCompletionService;
use memochat_infra::llm::openai_compat::OpenAiCompatibleProvider;
use memochat_infra::llm::openai_compat::config::openai_defaults;
use memochat_types::config::GlobalConfig;

use crate::cli::ProviderArgs;

/// Registry backed by the production completion service and YAML store.
pub type ConcreteRegistry = ManagerRegistry<LlmCompletionService, YamlConversationStore>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConcreteRegistry>,
    pub completion: Arc<LlmCompletionService>,
    pub store: Arc<YamlConversationStore>,
    pub config: Arc<GlobalConfig>,
}

impl AppState {
    /// Wire up services for `data_dir`.
    ///
    /// `provider` overrides the `[provider]` section of `config`; the result
    /// is written back so later readers see what is actually in use.
    pub fn init(data_dir: &Path, mut config: GlobalConfig, provider: ProviderArgs) -> Self {
        if let Some(base_url) = provider.base_url {
            config.provider.base_url = base_url;
        }
        if let Some(model) = provider.model {
            config.provider.model = model;
        }

        let completion = build_completion_service(SecretString::from(provider.api_key), &config);
        Self::with_completion(data_dir, config, completion)
    }

    /// Wire up services around an already built completion service.
    pub fn with_completion(
        data_dir: &Path,
        config: GlobalConfig,
        completion: LlmCompletionService,
    ) -> Self {
        let completion = Arc::new(completion);
        let store = Arc::new(YamlConversationStore::new(data_dir));
        let registry = Arc::new(ManagerRegistry::new(
            completion.clone(),
            store.clone(),
            config.memory.clone(),
        ));

        tracing::debug!(
            provider = completion.provider_name(),
            model = completion.model(),
            memories = %store.root().display(),
            "application state ready"
        );

        Self {
            registry,
            completion,
            store,
            config: Arc::new(config),
        }
    }

    pub fn model(&self) -> &str {
        self.completion.model()
    }
}

/// Build the completion service for the configured OpenAI-compatible endpoint.
fn build_completion_service(api_key: SecretString, config: &GlobalConfig) -> LlmCompletionService {
    let settings = &config.provider;
    let provider_config =
        openai_defaults(api_key, &settings.model).with_base_url(&settings.base_url);
    let provider = OpenAiCompatibleProvider::new(provider_config);
    LlmCompletionService::new(
        BoxLlmProvider::new(provider),
        settings.model.clone(),
        settings.max_tokens,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_args(model: Option<&str>) -> ProviderArgs {
        ProviderArgs {
            api_key: "sk-test".to_string(),
            base_url: Some("http://localhost:11434/v1/".to_string()),
            model: model.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_init_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(dir.path(), GlobalConfig::default(), provider_args(Some("llama3")));

        assert_eq!(state.model(), "llama3");
        assert_eq!(state.config.provider.model, "llama3");
        assert_eq!(state.config.provider.base_url, "http://localhost:11434/v1/");
        assert_eq!(state.completion.provider_name(), "openai_compatible");
        assert!(state.store.root().starts_with(dir.path()));
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_init_keeps_config_model_without_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = GlobalConfig::default();
        config.provider.model = "gpt-4o-mini".to_string();
        let state = AppState::init(dir.path(), config, provider_args(None));
        assert_eq!(state.model(), "gpt-4o-mini");
    }
}
