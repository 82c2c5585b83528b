//! OpenAI-style chat-completions provider, plus the embeddings endpoint.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::pricing::cost_for;
use crate::provider::{Completion, Provider, ProviderError, ProviderResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI provider configuration.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Chat model id.
    pub model: String,
    /// Embedding model id.
    pub embedding_model: String,
    /// API key; `None` leaves the provider unconfigured.
    pub api_key: Option<String>,
    /// Endpoint override for tests and proxies.
    pub base_url: Option<String>,
}

impl OpenAiConfig {
    /// Config with the key read from `OPENAI_API_KEY`.
    #[must_use]
    pub fn from_env(model: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            embedding_model: embedding_model.into(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: None,
        }
    }
}

/// OpenAI chat-completions provider.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    /// Create a provider with its own HTTP client.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let api_key = self.config.api_key.as_deref().ok_or(ProviderError::Auth {
            message: "OPENAI_API_KEY not set".into(),
        })?;
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {api_key}");
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| ProviderError::Auth {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> ProviderResult<Completion> {
        let url = format!("{}/v1/chat/completions", self.base_url());

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));
        let body = json!({"model": self.config.model, "messages": messages});

        debug!(model = %self.config.model, "sending chat-completions request");
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed {
                message: e.to_string(),
            })?;

        let text = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::Malformed {
                message: "response carried no choices".into(),
            })?;

        Ok(Completion {
            cost_usd: cost_for(
                &parsed.model,
                parsed.usage.prompt_tokens,
                parsed.usage.completion_tokens,
            ),
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
            model: parsed.model,
            text,
        })
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url());
        let body = json!({"model": self.config.embedding_model, "input": text});

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let parsed: EmbeddingsResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed {
                    message: e.to_string(),
                })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| ProviderError::Malformed {
                message: "embeddings response carried no data".into(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
