//! The [`Provider`] trait and provider errors.

use async_trait::async_trait;
use thiserror::Error;

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A completed generation call.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Prompt tokens consumed.
    pub prompt_tokens: u64,
    /// Completion tokens produced.
    pub completion_tokens: u64,
    /// Model that served the call.
    pub model: String,
    /// Cost in USD from the pricing table.
    pub cost_usd: f64,
}

/// One provider's failure inside an exhausted failover pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Provider name.
    pub provider: String,
    /// Why it was skipped or failed.
    pub reason: String,
}

/// Provider call failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success API status.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Missing or rejected credentials.
    #[error("auth error: {message}")]
    Auth {
        /// Details.
        message: String,
    },

    /// Response did not carry the expected fields.
    #[error("malformed response: {message}")]
    Malformed {
        /// Details.
        message: String,
    },

    /// Operation not offered by this provider.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        /// Provider name.
        provider: String,
        /// Operation name ("embed", ...).
        operation: String,
    },

    /// Every provider was skipped or failed in one failover pass.
    #[error("all providers failed: {}", format_failures(failures))]
    Exhausted {
        /// One entry per provider, in attempt order.
        failures: Vec<ProviderFailure>,
    },
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A generation provider in the failover chain.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name used in priority configuration.
    fn name(&self) -> &str;

    /// Model this provider serves.
    fn model(&self) -> &str;

    /// Whether the provider has what it needs to accept calls
    /// (typically: a credential is present).
    fn is_configured(&self) -> bool;

    /// Generate a complete response.
    async fn generate(&self, prompt: &str, system: Option<&str>) -> ProviderResult<Completion>;

    /// Embed text into a vector. Providers without an embedding endpoint
    /// return [`ProviderError::Unsupported`].
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let _ = text;
        Err(ProviderError::Unsupported {
            provider: self.name().to_owned(),
            operation: "embed".into(),
        })
    }
}

/// Introspection record for one provider in the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Provider name.
    pub name: String,
    /// Model served.
    pub model: String,
    /// Position in the ranked order (0 = tried first).
    pub rank: usize,
    /// Whether a credential is present.
    pub configured: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
