//! Seams for the external browser and vector-similarity collaborators.
//!
//! The core treats both as narrow async contracts: the browser executes
//! one named action at a time, the recall store upserts and queries
//! embedded text. Production implementations live outside this crate;
//! the in-tree types are the disabled/no-op stand-ins the binary wires
//! by default.

use async_trait::async_trait;
use serde_json::Value;

use ember_directives::BrowserAction;

use crate::errors::RuntimeError;

/// Result of one browser action.
#[derive(Clone, Debug, PartialEq)]
pub struct BrowserOutcome {
    /// Human-readable result ("Navigated to …", extracted text, ...).
    pub content: String,
    /// Optional structured payload (screenshot data, element lists).
    pub details: Option<Value>,
}

/// Executes named browser actions (navigate / click / type / screenshot /
/// extract-text) and returns a result record per action.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Execute a single action. The pipeline awaits this — it is the
    /// orchestrator's only suspension point on an external collaborator.
    async fn execute(&self, action: &BrowserAction) -> Result<BrowserOutcome, RuntimeError>;
}

/// Browser stand-in that rejects every action.
pub struct DisabledBrowser;

#[async_trait]
impl BrowserDriver for DisabledBrowser {
    async fn execute(&self, action: &BrowserAction) -> Result<BrowserOutcome, RuntimeError> {
        Err(RuntimeError::Browser {
            message: format!("browser automation disabled (action: {})", action.action),
        })
    }
}

/// Stores and retrieves embedded text for context augmentation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecallStore: Send + Sync {
    /// Index `text` with attached metadata.
    async fn upsert(&self, text: &str, meta: Value) -> Result<(), RuntimeError>;

    /// Return up to `top_k` stored texts most similar to `query`.
    async fn recall(&self, query: &str, top_k: usize) -> Result<Vec<String>, RuntimeError>;
}

/// Recall stand-in that stores nothing and recalls nothing.
pub struct NoRecall;

#[async_trait]
impl RecallStore for NoRecall {
    async fn upsert(&self, _text: &str, _meta: Value) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn recall(&self, _query: &str, _top_k: usize) -> Result<Vec<String>, RuntimeError> {
        Ok(Vec::new())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
