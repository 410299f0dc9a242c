//! OpenAI-compatible chat-completions client
//!
//! Used by the query planner for search-strategy brainstorming. The client
//! returns raw text; structural validation belongs to the caller.

use crate::config::GenerativeConfig;
use crate::providers::{ProviderError, TextGenerator, build_http_client};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Generative text client for an OpenAI-compatible `/chat/completions` API
pub struct OpenAiGenerator {
    client: ClientWithMiddleware,
    config: GenerativeConfig,
}

impl OpenAiGenerator {
    /// Create a new generative client
    pub fn new(config: GenerativeConfig) -> Result<Self, ProviderError> {
        // Completion calls are not retried: a slow model plus retries would
        // blow the planner's time budget, and the planner has its own
        // deterministic fallback.
        let client = build_http_client(config.timeout_seconds, 0)?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::Unavailable("generative API key not configured".into()))
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.config.model))]
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let key = self.api_key()?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "completions returned HTTP {status}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("completion had no choices".into()))?;

        debug!("completion returned {} chars", content.len());
        Ok(content)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn config_for(server: &Server) -> GenerativeConfig {
        GenerativeConfig {
            api_key: Some("test-key".into()),
            base_url: server.url_str(""),
            model: "test-model".into(),
            timeout_seconds: 5,
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_returns_first_choice_content() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/chat/completions"))
                .respond_with(json_encoded(serde_json::json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": "{\"tourism\": \"x\"}"}}
                    ]
                }))),
        );

        let client = OpenAiGenerator::new(config_for(&server)).unwrap();
        let text = client.complete("plan queries").await.unwrap();
        assert!(text.contains("tourism"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/chat/completions"))
                .respond_with(json_encoded(serde_json::json!({"choices": []}))),
        );

        let client = OpenAiGenerator::new(config_for(&server)).unwrap();
        let err = client.complete("plan queries").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
