//! Token and cost accounting payloads.
//!
//! [`CallUsage`] describes one successful generation call;
//! [`LedgerSnapshot`] is the cumulative picture published alongside it in
//! every usage-report event. The ledger itself is owned by the failover
//! client in `ember-llm` and is strictly non-decreasing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage figures for a single generation call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallUsage {
    /// Model that served the call.
    pub model: String,
    /// Prompt tokens consumed.
    pub prompt_tokens: u64,
    /// Completion tokens produced.
    pub completion_tokens: u64,
    /// Computed cost in USD.
    pub cost_usd: f64,
}

/// Per-model slice of the cumulative ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Prompt tokens attributed to the model.
    pub prompt_tokens: u64,
    /// Completion tokens attributed to the model.
    pub completion_tokens: u64,
    /// Cost in USD attributed to the model.
    pub cost_usd: f64,
}

/// Immutable copy of the cumulative usage ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Total prompt tokens across all calls.
    pub total_prompt_tokens: u64,
    /// Total completion tokens across all calls.
    pub total_completion_tokens: u64,
    /// Total cost in USD across all calls.
    pub total_cost_usd: f64,
    /// Breakdown keyed by model name.
    pub per_model: BTreeMap<String, ModelUsage>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
