//! Bounded per-conversation message history.
//!
//! Sessions are keyed by an opaque string the orchestrator derives from
//! channel + originating identity. Each session is a ring buffer: once
//! `capacity` is exceeded the oldest message is dropped. The store is the
//! sole owner of session state and is safe to touch from any adapter
//! thread.

use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::{debug, info};

use ember_core::messages::{Message, Role};

/// Thread-safe store of bounded conversation histories.
pub struct SessionStore {
    sessions: DashMap<String, VecDeque<Message>>,
    capacity: usize,
}

impl SessionStore {
    /// Create a store whose sessions retain at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity,
        }
    }

    /// Current ordered history for `id`, creating an empty session if the
    /// id is unknown.
    #[must_use]
    pub fn history(&self, id: &str) -> Vec<Message> {
        self.sessions
            .entry(id.to_owned())
            .or_default()
            .iter()
            .cloned()
            .collect()
    }

    /// Append a message, evicting the oldest entry once capacity is
    /// exceeded.
    pub fn add_message(&self, id: &str, role: Role, content: impl Into<String>) {
        let mut session = self.sessions.entry(id.to_owned()).or_default();
        session.push_back(Message::now(role, content));
        while session.len() > self.capacity {
            let _ = session.pop_front();
        }
        debug!(session_id = id, len = session.len(), "message added");
    }

    /// Empty a session without destroying it.
    pub fn clear(&self, id: &str) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.clear();
            info!(session_id = id, "session cleared");
        }
    }

    /// Render the history as a role-labelled transcript block for use as
    /// generation context. Empty history renders as an empty string.
    #[must_use]
    pub fn transcript(&self, id: &str) -> String {
        let history = self.history(id);
        if history.is_empty() {
            return String::new();
        }
        let mut out = String::from("--- CONVERSATION HISTORY ---\n");
        for msg in &history {
            out.push_str(msg.role.label());
            out.push_str(": ");
            out.push_str(&msg.content);
            out.push('\n');
        }
        out.push_str("--- END HISTORY ---\n");
        out
    }

    /// Number of sessions created so far.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
