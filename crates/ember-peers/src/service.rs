//! The peer coordination service.
//!
//! One tick = announce → discover → drain mailbox. The service's
//! in-memory peer set is eventually consistent with the shared
//! directory, bounded by the poll interval; both scans skip unreadable
//! or corrupt entries silently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::gauge;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use ember_core::events::EmberEvent;
use ember_core::peers::{MailboxMessage, PeerDeparture, PeerRecord};
use ember_events::EventFabric;

use crate::errors::PeerError;

/// Subdirectory of the shared area holding mailbox entries.
const MAILBOX_DIR: &str = "messages";

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Presence + mailbox coordination for one node.
pub struct PeerCoordinator {
    fabric: Arc<EventFabric>,
    comms_dir: PathBuf,
    mailbox_dir: PathBuf,
    identity: String,
    hostname: String,
    role: Option<String>,
    stale_after_secs: f64,
    peers: Mutex<HashMap<String, PeerRecord>>,
    last_message_id: AtomicU64,
}

impl PeerCoordinator {
    /// Create the service and its shared directories.
    pub fn new(
        fabric: Arc<EventFabric>,
        shared_dir: impl Into<PathBuf>,
        identity: impl Into<String>,
        hostname: impl Into<String>,
        role: Option<String>,
        stale_after_secs: u64,
    ) -> Result<Self, PeerError> {
        let comms_dir = shared_dir.into();
        let mailbox_dir = comms_dir.join(MAILBOX_DIR);
        std::fs::create_dir_all(&mailbox_dir)?;
        Ok(Self {
            fabric,
            comms_dir,
            mailbox_dir,
            identity: identity.into(),
            hostname: hostname.into(),
            role,
            stale_after_secs: stale_after_secs as f64,
            peers: Mutex::new(HashMap::new()),
            last_message_id: AtomicU64::new(0),
        })
    }

    /// This node's identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Snapshot of the currently known peers.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers.lock().values().cloned().collect()
    }

    /// Run one announce → discover → drain cycle.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn tick(&self) {
        if let Err(e) = self.announce() {
            warn!(error = %e, "presence announce failed");
        }
        self.discover().await;
        self.drain_mailbox().await;
    }

    /// Write or refresh this node's presence record.
    fn announce(&self) -> Result<(), PeerError> {
        let record = PeerRecord {
            identity: self.identity.clone(),
            hostname: self.hostname.clone(),
            timestamp: unix_now(),
            status: "active".into(),
            role: self.role.clone(),
            capabilities: std::collections::BTreeSet::new(),
            current_task: Some("monitoring".into()),
            last_seen: Some(chrono::Utc::now().to_rfc3339()),
        };
        let path = self.comms_dir.join(format!("{}.json", self.hostname));
        std::fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
        Ok(())
    }

    /// Scan the presence area: admit fresh records (join event on first
    /// sight), evict absent or stale peers (one departure event each).
    async fn discover(&self) {
        let now = unix_now();
        let mut found: HashMap<String, PeerRecord> = HashMap::new();

        let entries = match std::fs::read_dir(&self.comms_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "presence scan failed");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if path.file_stem().is_some_and(|stem| stem == self.hostname.as_str()) {
                continue;
            }
            // corrupt or unreadable records are skipped silently
            let Ok(raw) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(record) = serde_json::from_str::<PeerRecord>(&raw) else {
                continue;
            };
            if record.is_stale(now, self.stale_after_secs) {
                continue;
            }
            let _ = found.insert(record.identity.clone(), record);
        }

        let (joined, departed) = {
            let mut peers = self.peers.lock();
            let joined: Vec<PeerRecord> = found
                .values()
                .filter(|record| !peers.contains_key(&record.identity))
                .cloned()
                .collect();
            let departed: Vec<String> = peers
                .keys()
                .filter(|identity| !found.contains_key(*identity))
                .cloned()
                .collect();
            *peers = found;
            gauge!("ember_peers_known").set(peers.len() as f64);
            (joined, departed)
        };

        for record in joined {
            info!(peer = %record.identity, "peer discovered");
            self.fabric.publish(EmberEvent::PeerJoined(record)).await;
        }
        for identity in departed {
            info!(peer = %identity, "peer left or went stale");
            self.fabric
                .publish(EmberEvent::PeerLeft(PeerDeparture { identity }))
                .await;
        }
    }

    /// Read every mailbox entry addressed to this node, deleting each
    /// file immediately after reading, then publish the messages.
    async fn drain_mailbox(&self) {
        let prefix = format!("{}_", self.identity);
        let mut messages = Vec::new();

        let entries = match std::fs::read_dir(&self.mailbox_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "mailbox scan failed");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(message) = serde_json::from_str::<MailboxMessage>(&raw) else {
                continue;
            };
            // delete before dispatch: at-most-once, regardless of what
            // handlers do with the message
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(?path, error = %e, "failed to delete mailbox entry");
                continue;
            }
            messages.push(message);
        }

        for message in messages {
            debug!(from = %message.from, kind = %message.kind, "mailbox message received");
            self.fabric.publish(EmberEvent::PeerMessage(message)).await;
        }
    }

    /// Ids are epoch milliseconds, bumped monotonically so back-to-back
    /// sends to one recipient cannot collide on the file name.
    fn next_message_id(&self) -> u64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let prev = self
            .last_message_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
                Some(last.max(millis.saturating_sub(1)) + 1)
            })
            .unwrap_or_default();
        prev.max(millis.saturating_sub(1)) + 1
    }

    /// Write one mailbox entry addressed to `recipient`.
    pub fn send_message(
        &self,
        recipient: &str,
        kind: &str,
        content: Value,
    ) -> Result<(), PeerError> {
        let id = self.next_message_id();
        let message = MailboxMessage {
            id,
            from: self.identity.clone(),
            to: recipient.to_owned(),
            kind: kind.to_owned(),
            content,
            timestamp: chrono::Utc::now(),
        };
        let path = self
            .mailbox_dir
            .join(format!("{recipient}_{}_{id}.json", self.identity));
        std::fs::write(&path, serde_json::to_vec_pretty(&message)?)?;
        info!(recipient, kind, "mailbox message sent");
        Ok(())
    }

    /// Directory peers drop presence files into (visible for tests and
    /// the binary's startup log).
    #[must_use]
    pub fn comms_dir(&self) -> &Path {
        &self.comms_dir
    }

    /// Run the tick loop until `cancel` fires.
    ///
    /// The caller joins the returned handle; cancellation is checked
    /// every cycle, so shutdown latency is bounded by the interval.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(identity = %self.identity, "peer coordination started");
            loop {
                self.tick().await;
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    () = cancel.cancelled() => break,
                }
            }
            info!(identity = %self.identity, "peer coordination stopped");
        })
    }
}

/// Convenience payload for task delegation messages.
#[must_use]
pub fn task_content(text: &str) -> Value {
    json!({ "text": text })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
