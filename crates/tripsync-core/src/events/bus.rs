//! Synchronous publish/subscribe.
//!
//! `publish` runs every handler for the event's kind, in registration order,
//! before returning. There is no queue and no replay. The registry lock is
//! released before handlers run, so a handler may publish or (un)subscribe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{trace, warn};

use super::{DomainEvent, EventKind};

pub type Handler = Arc<dyn Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync>;

struct Registration {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_registered(&self, id: u64) -> bool {
        self.lock().iter().any(|r| r.id == id)
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|r| r.id != id);
    }
}

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().push(Registration {
            id,
            kind,
            handler: Arc::new(handler),
        });
        trace!(id, ?kind, "subscribed");

        Subscription {
            id,
            kind,
            bus: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    /// Deliver `event` to every current subscriber of its kind.
    ///
    /// A handler error is logged and does not stop delivery to later
    /// handlers. Panics are not caught.
    pub fn publish(&self, event: DomainEvent) -> PublishReport {
        let kind = event.kind();
        let snapshot: Vec<(u64, Handler)> = self
            .inner
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| (r.id, r.handler.clone()))
            .collect();

        let mut report = PublishReport::default();
        for (id, handler) in snapshot {
            // An earlier handler in this dispatch may have torn this one down
            if !self.inner.is_registered(id) {
                continue;
            }
            match handler(&event) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(subscriber = id, ?kind, error = %e, "event handler failed");
                }
            }
        }
        trace!(?kind, delivered = report.delivered, failed = report.failed, "published");
        report
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.lock().iter().filter(|r| r.kind == kind).count()
    }
}

/// Registration guard. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    bus: Weak<BusInner>,
    active: bool,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
            trace!(id = self.id, kind = ?self.kind, "unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .finish()
    }
}
