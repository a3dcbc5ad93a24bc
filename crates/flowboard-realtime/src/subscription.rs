//! Subscriber registry and synchronous snapshot fan-out.
//!
//! Delivery is synchronous and ordered: every registered subscriber is called
//! in registration order with the same [`Snapshot`]. The registry lock is never
//! held while a callback runs, so callbacks may subscribe, unsubscribe, or read
//! the store re-entrantly. A subscriber removed mid-round is skipped for the
//! rest of that round. A callback that panics or returns an error is reported
//! and skipped; the remaining subscribers still receive the snapshot.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{trace, warn};

use flowboard_core::Error;

use crate::snapshot::Snapshot;

/// Identifier of a subscriber within one store.
pub type SubscriberId = u64;

type Callback = Arc<dyn Fn(&Snapshot) -> std::result::Result<(), String> + Send + Sync>;

/// Outcome of one delivery round.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers whose callback returned normally.
    pub delivered: usize,
    /// One [`Error::SubscriberFailure`] per failing subscriber.
    pub failures: Vec<Error>,
}

/// Registered callbacks in registration order.
pub(crate) struct SubscriberRegistry {
    inner: Mutex<RegistryInner>,
    failures: AtomicU64,
}

#[derive(Default)]
struct RegistryInner {
    next_id: SubscriberId,
    entries: Vec<(SubscriberId, Callback)>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(RegistryInner::default()),
            failures: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push((id, Arc::new(callback)));
        trace!(subscriber_id = id, "Subscriber registered");

        Subscription {
            id,
            registry: Arc::downgrade(self),
            detached: false,
        }
    }

    /// Remove a subscriber. Returns false when it was already gone.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        // The removed callback is dropped after the lock is released: it may
        // own a Subscription whose Drop re-enters this registry.
        let removed = {
            let mut inner = self.lock();
            inner
                .entries
                .iter()
                .position(|(entry_id, _)| *entry_id == id)
                .map(|index| inner.entries.remove(index))
        };
        removed.is_some()
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.lock().entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub(crate) fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver `snapshot` to every subscriber registered when the round starts.
    pub(crate) fn deliver(&self, snapshot: &Snapshot) -> DeliveryReport {
        let round: Vec<(SubscriberId, Callback)> = self.lock().entries.clone();
        let mut report = DeliveryReport::default();

        for (id, callback) in round {
            // Unsubscribed by an earlier callback in this round.
            if !self.contains(id) {
                continue;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot)));
            let message = match outcome {
                Ok(Ok(())) => {
                    trace!(subscriber_id = id, "Snapshot delivered");
                    report.delivered += 1;
                    continue;
                }
                Ok(Err(message)) => message,
                Err(payload) => panic_message(payload.as_ref()),
            };

            self.failures.fetch_add(1, Ordering::Relaxed);
            let failure = Error::SubscriberFailure {
                subscriber: id,
                message,
            };
            warn!(
                subscriber_id = id,
                error = %failure,
                "Subscriber failed during delivery"
            );
            report.failures.push(failure);
        }

        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Handle for a registered subscriber.
///
/// Dropping the handle unsubscribes, like dropping a broadcast receiver.
/// Call [`Subscription::detach`] to keep the callback for the store's lifetime.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<SubscriberRegistry>,
    detached: bool,
}

impl Subscription {
    /// Identifier of this subscriber within its store.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Deregister the callback. Idempotent; returns true only on the call
    /// that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => {
                let removed = registry.remove(self.id);
                if removed {
                    trace!(subscriber_id = self.id, "Subscriber removed");
                }
                removed
            }
            None => false,
        }
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.contains(self.id))
            .unwrap_or(false)
    }

    /// Give up the handle without unsubscribing.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
