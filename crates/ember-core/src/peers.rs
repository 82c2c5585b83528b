//! Peer presence records and mailbox envelopes.
//!
//! These are the on-disk shapes shared between coordination-service
//! instances: one presence file per node, one JSON file per mailbox
//! message. The protocol itself lives in `ember-peers`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Presence record for one node in the shared coordination area.
///
/// Written by the owning node on every announce tick; read by every
/// other node during discovery. A record is live while its `timestamp`
/// is fresher than the staleness threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Logical agent identity (may differ from the hostname).
    pub identity: String,
    /// Machine the node runs on.
    pub hostname: String,
    /// Unix seconds of the last announce.
    pub timestamp: f64,
    /// Free-form status string ("active", "busy", ...).
    #[serde(default)]
    pub status: String,
    /// Declared role, if the node advertises one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Capability strings the node advertises.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub capabilities: BTreeSet<String>,
    /// What the node reports it is working on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    /// Human-readable last-seen string, for shared-directory browsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl PeerRecord {
    /// Whether this record is older than `threshold_secs` relative to `now`.
    #[must_use]
    pub fn is_stale(&self, now_unix: f64, threshold_secs: f64) -> bool {
        now_unix - self.timestamp >= threshold_secs
    }
}

/// Departure notice for a peer evicted from the local set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDeparture {
    /// Identity of the peer that left or went stale.
    pub identity: String,
}

/// Point-to-point message exchanged through the file mailbox.
///
/// Stored as `{recipient}_{sender}_{id}.json`. Delivery is at-most-once:
/// the file is deleted immediately after being read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MailboxMessage {
    /// Sender-assigned id (epoch milliseconds at send time).
    pub id: u64,
    /// Sending identity.
    pub from: String,
    /// Receiving identity.
    pub to: String,
    /// Message type ("task", "notify", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Structured payload.
    pub content: Value,
    /// When the message was written.
    pub timestamp: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(ts: f64) -> PeerRecord {
        PeerRecord {
            identity: "Auditor".into(),
            hostname: "host-a".into(),
            timestamp: ts,
            status: "active".into(),
            role: Some("auditor".into()),
            capabilities: BTreeSet::from(["security_scan".to_owned()]),
            current_task: None,
            last_seen: None,
        }
    }

    #[test]
    fn fresh_record_is_not_stale() {
        assert!(!record(1_000.0).is_stale(1_100.0, 120.0));
    }

    #[test]
    fn record_past_threshold_is_stale() {
        assert!(record(1_000.0).is_stale(1_120.0, 120.0));
        assert!(record(1_000.0).is_stale(2_000.0, 120.0));
    }

    #[test]
    fn record_roundtrips_without_optional_fields() {
        let json = json!({
            "identity": "Scout",
            "hostname": "host-b",
            "timestamp": 42.0
        });
        let rec: PeerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.identity, "Scout");
        assert!(rec.role.is_none());
        assert!(rec.capabilities.is_empty());
    }

    #[test]
    fn mailbox_message_uses_type_field_on_wire() {
        let msg = MailboxMessage {
            id: 7,
            from: "a".into(),
            to: "b".into(),
            kind: "task".into(),
            content: json!({"text": "scan"}),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "task");
        assert!(value.get("kind").is_none());
    }
}
