//! Settings schema.
//!
//! Every section has serde defaults so a partial `ember.json` merges
//! cleanly over the compiled values.

use ember_core::safety::SafetyPolicy;
use serde::{Deserialize, Serialize};

/// Root settings value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmberSettings {
    /// Node identity and default role.
    pub identity: IdentitySettings,
    /// Generation provider configuration.
    pub providers: ProviderSettings,
    /// Session history bounds.
    pub sessions: SessionSettings,
    /// Peer coordination paths and cadence.
    pub peers: PeerSettings,
    /// Command-approval policy.
    pub safety: SafetyPolicy,
    /// Version-control workspace.
    pub git: GitSettings,
    /// Thought-recall augmentation.
    pub recall: RecallSettings,
}

/// Who this node is.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Logical agent identity; defaults to the hostname when empty.
    pub identity: Option<String>,
    /// Role persona the orchestrator answers as.
    pub role: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            identity: None,
            role: "Lead Orchestrator".into(),
        }
    }
}

/// Generation provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Failover order; providers not listed here sort last in input order.
    pub priority: Vec<String>,
    /// Model served by the Anthropic-style provider.
    pub anthropic_model: String,
    /// Model served by the OpenAI-style provider.
    pub openai_model: String,
    /// Embedding model for `embed` calls.
    pub embedding_model: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            priority: vec!["anthropic".into(), "openai".into()],
            anthropic_model: "claude-sonnet-4-5".into(),
            openai_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
        }
    }
}

/// Session history bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Messages retained per session before eviction.
    pub capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}

/// Peer coordination paths and cadence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    /// Shared directory holding presence files and the mailbox.
    pub shared_dir: String,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Presence records older than this many seconds are stale.
    pub stale_after_secs: u64,
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            shared_dir: ".ember/agents".into(),
            poll_interval_ms: 1_000,
            stale_after_secs: 120,
        }
    }
}

/// Version-control workspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Repository root the conflict workflow operates in.
    pub workspace_root: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            workspace_root: ".".into(),
        }
    }
}

/// Thought-recall augmentation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallSettings {
    /// How many prior thoughts to pull into the context block.
    pub top_k: usize,
}

impl Default for RecallSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::safety::ApprovalPolicy;

    #[test]
    fn defaults_are_sane() {
        let settings = EmberSettings::default();
        assert_eq!(settings.identity.role, "Lead Orchestrator");
        assert_eq!(settings.sessions.capacity, 20);
        assert_eq!(settings.peers.stale_after_secs, 120);
        assert_eq!(settings.peers.poll_interval_ms, 1_000);
        assert_eq!(settings.safety.policy, ApprovalPolicy::Manual);
        assert_eq!(settings.providers.priority, ["anthropic", "openai"]);
    }

    #[test]
    fn partial_json_fills_remaining_defaults() {
        let settings: EmberSettings =
            serde_json::from_str(r#"{"sessions": {"capacity": 50}}"#).unwrap();
        assert_eq!(settings.sessions.capacity, 50);
        assert_eq!(settings.peers.stale_after_secs, 120);
    }
}
