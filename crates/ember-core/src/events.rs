//! The closed event vocabulary broadcast through the fabric.
//!
//! Every notification in the system is one [`EmberEvent`] variant; handlers
//! subscribe by [`EventKind`]. Keeping the union closed makes dispatch
//! exhaustive at compile time — there is no string-keyed event routing
//! anywhere in the tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::peers::{MailboxMessage, PeerDeparture, PeerRecord};
use crate::safety::ApprovalPolicy;
use crate::usage::{CallUsage, LedgerSnapshot};

/// Channel context of an inbound request; carried through the pipeline so
/// replies can be routed back to where the request came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ChannelOrigin {
    /// Long-polling bot chat, addressed by chat id.
    Chat {
        /// Reply-to chat id.
        chat_id: i64,
    },
    /// Email thread, addressed by sender address.
    Email {
        /// Reply-to address.
        address: String,
    },
    /// SMS conversation, addressed by phone number.
    Sms {
        /// Reply-to number.
        number: String,
    },
    /// Inbound webhook; replies are log-only.
    Webhook {
        /// Source label supplied by the adapter.
        source: String,
    },
    /// Line-oriented control channel (stdin/stdout).
    Terminal,
}

impl ChannelOrigin {
    /// Short channel label used in derived session ids and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "chat",
            Self::Email { .. } => "email",
            Self::Sms { .. } => "sms",
            Self::Webhook { .. } => "webhook",
            Self::Terminal => "terminal",
        }
    }
}

/// Inbound request from a channel adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Where the request came from.
    pub origin: ChannelOrigin,
    /// Originating identity (username, address, number).
    pub sender: String,
    /// Request text.
    pub text: String,
    /// When the adapter received it.
    pub timestamp: DateTime<Utc>,
}

/// Outbound reply routed back to a channel adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelReply {
    /// Channel context copied from the originating request.
    pub origin: ChannelOrigin,
    /// Reply text.
    pub text: String,
}

/// Workspace file-change notice from a watcher collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChanged {
    /// Workspace-relative path.
    pub path: String,
    /// What happened to the file.
    pub change: FileChangeKind,
}

/// Kind of file-system change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    /// File created.
    Created,
    /// File modified.
    Modified,
    /// File deleted.
    Deleted,
}

/// Version-control state change from the repository watcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStateChange {
    /// What changed.
    pub kind: GitChangeKind,
    /// Branch involved, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Commit id involved, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Kind of version-control state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitChangeKind {
    /// HEAD moved to another branch.
    BranchCheckout,
    /// A local branch ref advanced.
    CommitDetected,
    /// A remote-tracking ref changed.
    RemoteUpdate,
    /// The index was rewritten.
    IndexChange,
    /// A merge began or ended; may mean unresolved conflicts.
    MergeStateChange,
}

/// Usage report published after every successful generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// The single call's figures.
    pub call: CallUsage,
    /// Cumulative ledger at the time of the call.
    pub ledger: LedgerSnapshot,
}

/// Operator intent from a UI or control channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ControlIntent {
    /// Switch the command-approval mode.
    SetPolicy {
        /// New mode.
        policy: ApprovalPolicy,
    },
    /// Switch the orchestrator's active role persona.
    SetRole {
        /// Role name.
        role: String,
    },
    /// Pin a specific provider to the front of the failover order.
    SetActiveProvider {
        /// Provider name.
        provider: String,
    },
}

/// Every notification the fabric can carry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmberEvent {
    /// Inbound channel request.
    ChannelMessage(ChannelMessage),
    /// Outbound channel reply.
    ChannelReply(ChannelReply),
    /// Workspace file change.
    FileChanged(FileChanged),
    /// Version-control state change.
    GitState(GitStateChange),
    /// A peer entered the presence set.
    PeerJoined(PeerRecord),
    /// A peer left or went stale.
    PeerLeft(PeerDeparture),
    /// A mailbox message addressed to this node.
    PeerMessage(MailboxMessage),
    /// Token/cost accounting after a successful generation.
    UsageReport(UsageReport),
    /// Operator control intent.
    Control(ControlIntent),
}

/// Subscription key: the discriminant of [`EmberEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`EmberEvent::ChannelMessage`]
    ChannelMessage,
    /// [`EmberEvent::ChannelReply`]
    ChannelReply,
    /// [`EmberEvent::FileChanged`]
    FileChanged,
    /// [`EmberEvent::GitState`]
    GitState,
    /// [`EmberEvent::PeerJoined`]
    PeerJoined,
    /// [`EmberEvent::PeerLeft`]
    PeerLeft,
    /// [`EmberEvent::PeerMessage`]
    PeerMessage,
    /// [`EmberEvent::UsageReport`]
    UsageReport,
    /// [`EmberEvent::Control`]
    Control,
}

impl EmberEvent {
    /// The subscription key this event dispatches under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ChannelMessage(_) => EventKind::ChannelMessage,
            Self::ChannelReply(_) => EventKind::ChannelReply,
            Self::FileChanged(_) => EventKind::FileChanged,
            Self::GitState(_) => EventKind::GitState,
            Self::PeerJoined(_) => EventKind::PeerJoined,
            Self::PeerLeft(_) => EventKind::PeerLeft,
            Self::PeerMessage(_) => EventKind::PeerMessage,
            Self::UsageReport(_) => EventKind::UsageReport,
            Self::Control(_) => EventKind::Control,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
