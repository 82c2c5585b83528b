//! Failover client — tries providers in ranked order, accounts usage.

use std::sync::Arc;

use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use ember_core::events::{EmberEvent, UsageReport};
use ember_core::usage::{CallUsage, LedgerSnapshot};
use ember_events::EventFabric;

use crate::ledger::UsageLedger;
use crate::provider::{
    Completion, Provider, ProviderDescriptor, ProviderError, ProviderFailure, ProviderResult,
};
use crate::ranking::rank_providers;

/// Ordered provider chain with usage accounting.
///
/// One `generate` call makes exactly one pass over the chain: each
/// provider is tried at most once, and the first success wins. Usage is
/// recorded and published only for that success.
pub struct FailoverClient {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    ledger: Mutex<UsageLedger>,
    fabric: Arc<EventFabric>,
}

impl FailoverClient {
    /// Build a client over `providers`, ranked by `priority`.
    #[must_use]
    pub fn new(
        mut providers: Vec<Arc<dyn Provider>>,
        priority: &[String],
        fabric: Arc<EventFabric>,
    ) -> Self {
        rank_providers(&mut providers, priority);
        if providers.is_empty() {
            warn!("no generation providers configured");
        }
        Self {
            providers: RwLock::new(providers),
            ledger: Mutex::new(UsageLedger::new()),
            fabric,
        }
    }

    /// Generate with the first provider that succeeds.
    ///
    /// Unconfigured providers are skipped; failing providers are logged
    /// and the next is tried. Exhaustion yields one
    /// [`ProviderError::Exhausted`] enumerating every reason.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> ProviderResult<Completion> {
        let providers = self.providers.read().clone();
        let mut failures = Vec::new();

        for provider in providers {
            let name = provider.name().to_owned();
            if !provider.is_configured() {
                debug!(provider = %name, "skipping unconfigured provider");
                failures.push(ProviderFailure {
                    provider: name,
                    reason: "not configured".into(),
                });
                continue;
            }

            debug!(provider = %name, model = provider.model(), "attempting generation");
            match provider.generate(prompt, system).await {
                Ok(completion) => {
                    info!(provider = %name, model = %completion.model, "generation succeeded");
                    self.record_usage(&completion).await;
                    return Ok(completion);
                }
                Err(e) => {
                    counter!("ember_provider_failovers_total").increment(1);
                    error!(provider = %name, error = %e, "provider failed, trying next");
                    failures.push(ProviderFailure {
                        provider: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ProviderError::Exhausted { failures })
    }

    /// Embed with the first provider that succeeds. Does not touch the
    /// usage ledger.
    pub async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let providers = self.providers.read().clone();
        let mut failures = Vec::new();

        for provider in providers {
            let name = provider.name().to_owned();
            if !provider.is_configured() {
                failures.push(ProviderFailure {
                    provider: name,
                    reason: "not configured".into(),
                });
                continue;
            }
            match provider.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => failures.push(ProviderFailure {
                    provider: name,
                    reason: e.to_string(),
                }),
            }
        }

        Err(ProviderError::Exhausted { failures })
    }

    /// Current ledger totals.
    #[must_use]
    pub fn ledger(&self) -> LedgerSnapshot {
        self.ledger.lock().snapshot()
    }

    /// Move the named provider to the front of the chain. Returns false
    /// when no provider has that name.
    pub fn prefer(&self, name: &str) -> bool {
        let mut providers = self.providers.write();
        let Some(index) = providers.iter().position(|p| p.name() == name) else {
            return false;
        };
        let provider = providers.remove(index);
        providers.insert(0, provider);
        info!(provider = name, "provider pinned to front of failover order");
        true
    }

    /// Introspection view of the chain in attempt order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.providers
            .read()
            .iter()
            .enumerate()
            .map(|(rank, p)| ProviderDescriptor {
                name: p.name().to_owned(),
                model: p.model().to_owned(),
                rank,
                configured: p.is_configured(),
            })
            .collect()
    }

    async fn record_usage(&self, completion: &Completion) {
        let call = CallUsage {
            model: completion.model.clone(),
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
            cost_usd: completion.cost_usd,
        };
        let ledger = {
            let mut ledger = self.ledger.lock();
            ledger.record(&call);
            ledger.snapshot()
        };
        self.fabric
            .publish(EmberEvent::UsageReport(UsageReport { call, ledger }))
            .await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use ember_core::events::EventKind;

    struct StubProvider {
        name: &'static str,
        configured: bool,
        outcome: Result<(u64, u64), &'static str>,
    }

    impl StubProvider {
        fn ok(name: &'static str, prompt: u64, completion: u64) -> Arc<dyn Provider> {
            Arc::new(Self {
                name,
                configured: true,
                outcome: Ok((prompt, completion)),
            })
        }

        fn failing(name: &'static str, reason: &'static str) -> Arc<dyn Provider> {
            Arc::new(Self {
                name,
                configured: true,
                outcome: Err(reason),
            })
        }

        fn unconfigured(name: &'static str) -> Arc<dyn Provider> {
            Arc::new(Self {
                name,
                configured: false,
                outcome: Err("should never be called"),
            })
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn model(&self) -> &str {
            "stub-model"
        }
        fn is_configured(&self) -> bool {
            self.configured
        }
        async fn generate(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> ProviderResult<Completion> {
            match self.outcome {
                Ok((prompt_tokens, completion_tokens)) => Ok(Completion {
                    text: format!("reply from {}", self.name),
                    prompt_tokens,
                    completion_tokens,
                    model: format!("{}-model", self.name),
                    cost_usd: 0.01,
                }),
                Err(reason) => Err(ProviderError::Api {
                    status: 500,
                    message: reason.into(),
                }),
            }
        }
    }

    fn client(providers: Vec<Arc<dyn Provider>>) -> FailoverClient {
        FailoverClient::new(providers, &[], Arc::new(EventFabric::new()))
    }

    // ── generate ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_success_wins_and_ledger_reflects_only_it() {
        let client = client(vec![
            StubProvider::failing("a", "down"),
            StubProvider::ok("b", 10, 20),
            StubProvider::ok("c", 99, 99),
        ]);

        let completion = client.generate("hi", None).await.unwrap();
        assert_eq!(completion.text, "reply from b");

        let ledger = client.ledger();
        assert_eq!(ledger.total_prompt_tokens, 10);
        assert_eq!(ledger.total_completion_tokens, 20);
        assert!(ledger.per_model.contains_key("b-model"));
        assert!(!ledger.per_model.contains_key("c-model"));
    }

    #[tokio::test]
    async fn unconfigured_providers_are_skipped() {
        let client = client(vec![
            StubProvider::unconfigured("a"),
            StubProvider::ok("b", 1, 1),
        ]);
        let completion = client.generate("hi", None).await.unwrap();
        assert_eq!(completion.text, "reply from b");
    }

    #[tokio::test]
    async fn exhaustion_enumerates_every_reason() {
        let client = client(vec![
            StubProvider::unconfigured("a"),
            StubProvider::failing("b", "rate limited"),
        ]);

        let err = client.generate("hi", None).await.unwrap_err();
        assert_matches!(&err, ProviderError::Exhausted { failures } if failures.len() == 2);
        let msg = err.to_string();
        assert!(msg.contains("a: not configured"));
        assert!(msg.contains("b:"));
        assert!(msg.contains("rate limited"));
    }

    #[tokio::test]
    async fn failed_generation_leaves_ledger_untouched() {
        let client = client(vec![StubProvider::failing("a", "down")]);
        let _ = client.generate("hi", None).await.unwrap_err();
        assert_eq!(client.ledger().total_prompt_tokens, 0);
    }

    #[tokio::test]
    async fn usage_event_carries_call_and_cumulative_ledger() {
        let fabric = Arc::new(EventFabric::new());
        let reports: Arc<Mutex<Vec<UsageReport>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        fabric.subscribe(EventKind::UsageReport, "collector", move |event| {
            let sink = Arc::clone(&sink);
            async move {
                if let EmberEvent::UsageReport(report) = event {
                    sink.lock().push(report);
                }
                Ok(())
            }
        });

        let client = FailoverClient::new(vec![StubProvider::ok("a", 10, 20)], &[], fabric);
        let _ = client.generate("hi", None).await.unwrap();
        let _ = client.generate("again", None).await.unwrap();

        let reports = reports.lock();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].call.prompt_tokens, 10);
        assert_eq!(reports[0].ledger.total_prompt_tokens, 10);
        // second event carries the cumulative ledger
        assert_eq!(reports[1].ledger.total_prompt_tokens, 20);
    }

    // ── ranking and preference ───────────────────────────────────────────

    #[tokio::test]
    async fn priority_list_orders_the_chain() {
        let client = FailoverClient::new(
            vec![StubProvider::ok("b", 1, 1), StubProvider::ok("a", 1, 1)],
            &["a".to_owned(), "b".to_owned()],
            Arc::new(EventFabric::new()),
        );
        let completion = client.generate("hi", None).await.unwrap();
        assert_eq!(completion.text, "reply from a");
    }

    #[tokio::test]
    async fn prefer_moves_provider_to_front() {
        let client = client(vec![StubProvider::ok("a", 1, 1), StubProvider::ok("b", 1, 1)]);
        assert!(client.prefer("b"));
        let completion = client.generate("hi", None).await.unwrap();
        assert_eq!(completion.text, "reply from b");
        assert!(!client.prefer("nonexistent"));
    }

    #[test]
    fn descriptors_expose_rank_and_configuration() {
        let client = client(vec![
            StubProvider::ok("a", 1, 1),
            StubProvider::unconfigured("b"),
        ]);
        let descriptors = client.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].name, "a");
        assert_eq!(descriptors[0].rank, 0);
        assert!(descriptors[0].configured);
        assert!(!descriptors[1].configured);
    }

    // ── embed ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn embed_exhausts_when_no_provider_supports_it() {
        let client = client(vec![StubProvider::ok("a", 1, 1)]);
        let err = client.embed("text").await.unwrap_err();
        assert_matches!(err, ProviderError::Exhausted { .. });
        // ledger untouched by embed attempts
        assert_eq!(client.ledger().total_prompt_tokens, 0);
    }
}
