//! Anthropic-style messages provider (non-streaming).

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::pricing::cost_for;
use crate::provider::{Completion, Provider, ProviderError, ProviderResult};

/// API version header value.
const API_VERSION: &str = "2023-06-01";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Anthropic provider configuration.
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// Model id sent with every request.
    pub model: String,
    /// API key; `None` leaves the provider unconfigured.
    pub api_key: Option<String>,
    /// Endpoint override for tests and proxies.
    pub base_url: Option<String>,
    /// Completion budget per call.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Config with the key read from `ANTHROPIC_API_KEY`.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Anthropic messages-endpoint provider.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicProvider {
    /// Create a provider with its own HTTP client.
    #[must_use]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: AnthropicConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let api_key = self.config.api_key.as_deref().ok_or(ProviderError::Auth {
            message: "ANTHROPIC_API_KEY not set".into(),
        })?;
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let _ = headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|e| ProviderError::Auth {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> ProviderResult<Completion> {
        let base_url = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base_url}/v1/messages");

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        debug!(model = %self.config.model, "sending messages request");
        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed {
                    message: e.to_string(),
                })?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ProviderError::Malformed {
                message: "response carried no text content".into(),
            });
        }

        Ok(Completion {
            cost_usd: cost_for(&parsed.model, parsed.usage.input_tokens, parsed.usage.output_tokens),
            prompt_tokens: parsed.usage.input_tokens,
            completion_tokens: parsed.usage.output_tokens,
            model: parsed.model,
            text,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
