//! Line-oriented terminal channel.
//!
//! The minimal in-tree channel adapter: stdin lines become channel
//! messages, replies addressed to the terminal print to stdout. Lines
//! starting with `/` are control intents rather than requests.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ember_core::events::{ChannelMessage, ChannelOrigin, ControlIntent, EmberEvent, EventKind};
use ember_core::safety::ApprovalPolicy;
use ember_events::EventFabric;

/// Sender identity attached to terminal input.
const OPERATOR: &str = "operator";

/// Print replies routed back to the terminal channel.
pub fn print_replies(fabric: &EventFabric) {
    fabric.subscribe(EventKind::ChannelReply, "terminal-printer", |event| async move {
        if let EmberEvent::ChannelReply(reply) = event {
            if reply.origin == ChannelOrigin::Terminal {
                println!("{}", reply.text);
            }
        }
        Ok(())
    });
}

/// Parse a `/...` control line into an intent.
fn parse_control(line: &str) -> Option<ControlIntent> {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let argument = parts.next().unwrap_or_default().trim();
    match command {
        "/policy" => {
            let policy = match argument {
                "auto" => ApprovalPolicy::Auto,
                "privileged" => ApprovalPolicy::PrivilegedOnly,
                "manual" => ApprovalPolicy::Manual,
                _ => {
                    warn!(argument, "unknown policy, expected auto|privileged|manual");
                    return None;
                }
            };
            Some(ControlIntent::SetPolicy { policy })
        }
        "/role" if !argument.is_empty() => Some(ControlIntent::SetRole {
            role: argument.to_owned(),
        }),
        "/provider" if !argument.is_empty() => Some(ControlIntent::SetActiveProvider {
            provider: argument.to_owned(),
        }),
        _ => {
            warn!(line, "unrecognized control line");
            None
        }
    }
}

/// Read stdin until EOF or cancellation, publishing each line.
pub fn spawn(fabric: Arc<EventFabric>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        info!("terminal channel ready");
        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                () = cancel.cancelled() => break,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let event = if trimmed.starts_with('/') {
                match parse_control(trimmed) {
                    Some(intent) => EmberEvent::Control(intent),
                    None => continue,
                }
            } else {
                EmberEvent::ChannelMessage(ChannelMessage {
                    origin: ChannelOrigin::Terminal,
                    sender: OPERATOR.into(),
                    text: trimmed.to_owned(),
                    timestamp: chrono::Utc::now(),
                })
            };
            fabric.publish(event).await;
        }
        info!("terminal channel closed");
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
