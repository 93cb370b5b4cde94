//! Configuration and defaults for OpenAI-compatible providers.
//!
//! Any endpoint that speaks the OpenAI chat completions protocol (OpenAI
//! itself, local gateways, hosted proxies) is reached through an
//! [`OpenAiCompatConfig`] with the right base URL.

use secrecy::SecretString;

/// Default base URL for the official OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible LLM provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`]. Does not derive
/// Debug; the API key must never reach logs.
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai").
    pub provider_name: String,
    /// Base URL for the API (e.g., "https://api.openai.com/v1").
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves `model` empty.
    pub model: String,
}

impl OpenAiCompatConfig {
    /// Point this configuration at another endpoint.
    ///
    /// Trailing slashes are trimmed. A non-default URL renames the provider
    /// to `openai_compatible` so logs distinguish it from the official API.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed != OPENAI_BASE_URL {
            self.provider_name = "openai_compatible".into();
        }
        self.base_url = trimmed.into();
        self
    }
}

/// OpenAI default configuration.
///
/// Base URL: `https://api.openai.com/v1`
pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        model: model.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_openai_defaults() {
        let config = openai_defaults(SecretString::from("sk-test"), "gpt-3.5-turbo");
        assert_eq!(config.provider_name, "openai");
        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.model, "gpt-3.5-turbo");
        assert_eq!(config.api_key.expose_secret(), "sk-test");
    }

    #[test]
    fn test_with_base_url_custom() {
        let config = openai_defaults(SecretString::from("sk-test"), "llama3")
            .with_base_url("http://localhost:11434/v1/");
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.provider_name, "openai_compatible");
    }

    #[test]
    fn test_with_base_url_default_keeps_name() {
        let config = openai_defaults(SecretString::from("sk-test"), "gpt-4o")
            .with_base_url("https://api.openai.com/v1/");
        assert_eq!(config.provider_name, "openai");
    }
}
