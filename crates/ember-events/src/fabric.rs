//! Publish/subscribe event dispatcher.
//!
//! Handlers register per [`EventKind`] and run in registration order.
//! `publish` awaits each handler on the calling task and does not return
//! until all of them have run; a failing handler is logged and skipped
//! over, never surfaced to the publisher. The handler list is snapshotted
//! at publish time, so subscribing from inside a handler neither crashes
//! the fan-out nor changes the current one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use ember_core::events::{EmberEvent, EventKind};

/// Error type handlers may return; logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type HandlerFn =
    dyn Fn(EmberEvent) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync;

#[derive(Clone)]
struct Subscriber {
    label: Arc<str>,
    handler: Arc<HandlerFn>,
}

/// In-process event dispatcher.
///
/// Constructed once at startup and passed by `Arc` to every component —
/// there is no process-wide bus.
#[derive(Default)]
pub struct EventFabric {
    subscribers: Mutex<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventFabric {
    /// Create an empty fabric.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`. `label` identifies the subscriber in
    /// failure logs. Registration order is dispatch order.
    pub fn subscribe<F, Fut>(&self, kind: EventKind, label: impl Into<String>, handler: F)
    where
        F: Fn(EmberEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let label: Arc<str> = label.into().into();
        debug!(?kind, subscriber = %label, "subscribed");
        let subscriber = Subscriber {
            label,
            handler: Arc::new(move |event| -> BoxFuture<'static, Result<(), HandlerError>> {
                Box::pin(handler(event))
            }),
        };
        self.subscribers
            .lock()
            .entry(kind)
            .or_default()
            .push(subscriber);
    }

    /// Dispatch `event` to every subscriber of its kind, in registration
    /// order, awaiting each in turn. Zero subscribers is a silent no-op.
    pub async fn publish(&self, event: EmberEvent) {
        let kind = event.kind();
        // Snapshot under the lock, run outside it: a handler may subscribe
        // or publish without deadlocking, and mid-publish mutation cannot
        // skip or repeat entries.
        let snapshot: Vec<Subscriber> = {
            let subscribers = self.subscribers.lock();
            match subscribers.get(&kind) {
                Some(list) => list.clone(),
                None => {
                    trace!(?kind, "published with no subscribers");
                    return;
                }
            }
        };

        counter!("ember_events_published_total").increment(1);
        trace!(?kind, subscribers = snapshot.len(), "publishing");

        for subscriber in snapshot {
            if let Err(e) = (subscriber.handler)(event.clone()).await {
                counter!("ember_event_handler_failures_total").increment(1);
                error!(?kind, subscriber = %subscriber.label, error = %e, "event handler failed");
            }
        }
    }

    /// Number of handlers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .lock()
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
