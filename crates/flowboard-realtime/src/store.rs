//! Authoritative in-memory activity log with subscriber fan-out.
//!
//! The store keeps a deduplicated, bounded log ordered newest first. Entries
//! live in a `BTreeMap` keyed by `(Reverse(timestamp), id)`, so iteration is
//! display order and the oldest entry is always the last key. A side index
//! from id to timestamp makes duplicate detection and replacement O(log n).
//!
//! Each state change rebuilds one immutable [`Snapshot`] and queues it for
//! delivery while still holding the write lock, so the delivery queue is in
//! mutation order. Whichever caller finds the queue idle drains it after the
//! lock is released; callers that find a drain in progress (another thread,
//! or a callback ingesting re-entrantly) leave their snapshot to that drain.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use flowboard_core::{Activity, ChangePayload, Error, RawActivity, Result};

use crate::config::StoreConfig;
use crate::snapshot::Snapshot;
use crate::subscription::{SubscriberRegistry, Subscription};

/// Result of a successful `ingest` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// New id added. `evicted` names the oldest entry dropped to stay in bounds.
    Inserted { evicted: Option<String> },
    /// Existing id updated in place with a newer timestamp.
    Replaced,
    /// Duplicate delivery with an older-or-equal timestamp; nothing changed.
    Unchanged,
    /// New id older than everything retained in a full store; not kept.
    Discarded,
    /// Payload carried no activity (row delete, or a row from another table).
    Skipped,
    /// Sent by a pump bound to a generation the store has since reset away.
    Stale,
}

impl IngestOutcome {
    /// Whether the visible log changed (and subscribers were notified).
    pub fn changed(&self) -> bool {
        matches!(self, Self::Inserted { .. } | Self::Replaced)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::Replaced => "replaced",
            Self::Unchanged => "unchanged",
            Self::Discarded => "discarded",
            Self::Skipped => "skipped",
            Self::Stale => "stale",
        }
    }
}

/// Point-in-time counters for a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub retained: usize,
    pub capacity: usize,
    pub subscribers: usize,
    /// Resets so far.
    pub generation: u64,
    /// Calls that changed visible state.
    pub applied: u64,
    /// Calls rejected as malformed, including undecodable frames.
    pub rejected: u64,
    /// Duplicate deliveries absorbed without change.
    pub duplicates: u64,
    /// Entries dropped to respect capacity (including discarded arrivals).
    pub evicted: u64,
    pub subscriber_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    newest_first: Reverse<DateTime<Utc>>,
    id: String,
}

impl OrderKey {
    fn new(timestamp: DateTime<Utc>, id: &str) -> Self {
        Self {
            newest_first: Reverse(timestamp),
            id: id.to_string(),
        }
    }
}

#[derive(Default)]
struct LogState {
    ordered: BTreeMap<OrderKey, Activity>,
    timestamps: HashMap<String, DateTime<Utc>>,
    snapshot: Snapshot,
    generation: u64,
}

impl LogState {
    fn rebuild_snapshot(&mut self) -> Snapshot {
        self.snapshot = Snapshot::from_vec(self.ordered.values().cloned().collect());
        self.snapshot.clone()
    }
}

/// Snapshots waiting for delivery, oldest first.
#[derive(Default)]
struct DeliveryQueue {
    pending: VecDeque<Snapshot>,
    draining: bool,
}

#[derive(Default)]
struct Counters {
    applied: AtomicU64,
    rejected: AtomicU64,
    duplicates: AtomicU64,
    evicted: AtomicU64,
}

/// Deduplicated, time-ordered, bounded activity log.
///
/// One store is created per workspace session and shared behind an `Arc`.
/// Only the ingest boundary (the event-source pump or optimistic local
/// writes) calls [`ingest`](Self::ingest); views use
/// [`subscribe`](Self::subscribe) and [`snapshot`](Self::snapshot).
///
/// Subscribers see snapshots in mutation order even with several mutating
/// threads. A mutation whose snapshot is picked up by a drain already in
/// progress returns before that snapshot has been delivered.
pub struct RealtimeStore {
    capacity: usize,
    state: RwLock<LogState>,
    deliveries: Mutex<DeliveryQueue>,
    subscribers: Arc<SubscriberRegistry>,
    counters: Counters,
}

impl RealtimeStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            state: RwLock::new(LogState::default()),
            deliveries: Mutex::new(DeliveryQueue::default()),
            subscribers: SubscriberRegistry::new(),
            counters: Counters::default(),
        }
    }

    /// Store with the given capacity and otherwise default configuration.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(StoreConfig::default().with_capacity(capacity))
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LogState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LogState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_deliveries(&self) -> MutexGuard<'_, DeliveryQueue> {
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Ingest
    // =========================================================================

    /// Merge one activity into the log.
    ///
    /// - Empty `id` → `Err(MalformedEvent)`, nothing changes.
    /// - Known `id` → replaced only if `timestamp` is strictly newer.
    /// - New `id` → inserted in order; the oldest entry is evicted when the
    ///   log grows past capacity.
    ///
    /// Subscribers are notified exactly once when the visible log changed.
    pub fn ingest(&self, activity: Activity) -> Result<IngestOutcome> {
        self.merge(activity, None)
    }

    /// Validate a raw row and ingest it.
    pub fn ingest_raw(&self, raw: RawActivity) -> Result<IngestOutcome> {
        let activity = raw.validate().map_err(|e| self.reject(e))?;
        self.merge(activity, None)
    }

    /// Decode a backend change payload and ingest the activity it carries.
    ///
    /// Row deletes and rows from tables other than the activity table carry
    /// nothing to ingest and yield [`IngestOutcome::Skipped`].
    pub fn ingest_payload(&self, payload: ChangePayload) -> Result<IngestOutcome> {
        self.ingest_payload_within(payload, None)
    }

    /// Decode a JSON text frame and ingest it like [`ingest_payload`](Self::ingest_payload).
    /// Undecodable frames count as rejections.
    pub fn ingest_frame(&self, frame: &str) -> Result<IngestOutcome> {
        self.ingest_frame_within(frame, None)
    }

    pub(crate) fn ingest_frame_within(
        &self,
        frame: &str,
        generation: Option<u64>,
    ) -> Result<IngestOutcome> {
        let payload = ChangePayload::from_json(frame).map_err(|e| self.reject(e))?;
        self.ingest_payload_within(payload, generation)
    }

    /// Ingest on behalf of a pump bound to `generation`. A store reset since
    /// then turns the call into [`IngestOutcome::Stale`].
    pub(crate) fn ingest_payload_within(
        &self,
        payload: ChangePayload,
        generation: Option<u64>,
    ) -> Result<IngestOutcome> {
        if !payload.is_activity_row() {
            debug!(table = ?payload.table, "Ignoring row from another table");
            return Ok(IngestOutcome::Skipped);
        }
        match payload.into_activity().map_err(|e| self.reject(e))? {
            Some(activity) => self.merge(activity, generation),
            None => {
                debug!("Ignoring row delete");
                Ok(IngestOutcome::Skipped)
            }
        }
    }

    #[instrument(
        name = "ingest",
        skip(self, activity),
        fields(activity_id = %activity.id, action = %activity.action)
    )]
    fn merge(&self, activity: Activity, generation: Option<u64>) -> Result<IngestOutcome> {
        if activity.id.trim().is_empty() {
            return Err(self.reject(Error::malformed("missing id")));
        }

        let (outcome, retained) = {
            let mut state = self.write_state();
            let existing = state.timestamps.get(&activity.id).copied();
            let outcome = match existing {
                _ if generation.is_some_and(|g| g != state.generation) => IngestOutcome::Stale,
                Some(existing) if activity.timestamp <= existing => IngestOutcome::Unchanged,
                Some(existing) => {
                    state.ordered.remove(&OrderKey::new(existing, &activity.id));
                    state
                        .timestamps
                        .insert(activity.id.clone(), activity.timestamp);
                    state
                        .ordered
                        .insert(OrderKey::new(activity.timestamp, &activity.id), activity);
                    IngestOutcome::Replaced
                }
                None => {
                    let id = activity.id.clone();
                    state.timestamps.insert(id.clone(), activity.timestamp);
                    state
                        .ordered
                        .insert(OrderKey::new(activity.timestamp, &id), activity);

                    if state.ordered.len() > self.capacity {
                        match state.ordered.pop_last() {
                            Some((oldest, _)) => {
                                state.timestamps.remove(&oldest.id);
                                self.counters.evicted.fetch_add(1, Ordering::Relaxed);
                                if oldest.id == id {
                                    IngestOutcome::Discarded
                                } else {
                                    IngestOutcome::Inserted {
                                        evicted: Some(oldest.id),
                                    }
                                }
                            }
                            None => IngestOutcome::Inserted { evicted: None },
                        }
                    } else {
                        IngestOutcome::Inserted { evicted: None }
                    }
                }
            };

            if outcome.changed() {
                let snapshot = state.rebuild_snapshot();
                self.enqueue(snapshot);
            }
            (outcome, state.ordered.len())
        };

        debug!(outcome = outcome.as_str(), retained, "Activity ingested");

        match outcome {
            ref o if o.changed() => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                self.drain();
            }
            IngestOutcome::Unchanged => {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        Ok(outcome)
    }

    fn reject(&self, error: Error) -> Error {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(error = %error, "Rejected malformed activity");
        error
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Queue a snapshot. Called with the state write lock held.
    fn enqueue(&self, snapshot: Snapshot) {
        self.lock_deliveries().pending.push_back(snapshot);
    }

    /// Deliver queued snapshots in order unless a drain is already running.
    fn drain(&self) {
        {
            let mut queue = self.lock_deliveries();
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = self.lock_deliveries();
                match queue.pending.pop_front() {
                    Some(snapshot) => snapshot,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };

            let report = self.subscribers.deliver(&next);
            if !report.failures.is_empty() {
                debug!(
                    delivered = report.delivered,
                    failed = report.failures.len(),
                    "Delivery round completed with failures"
                );
            }
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a callback for every change. Dropping or unsubscribing the
    /// returned handle deregisters it.
    ///
    /// The callback is not invoked on registration; read [`snapshot`](Self::snapshot)
    /// for the initial state.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.subscribers.register(move |snapshot| {
            callback(snapshot);
            Ok(())
        })
    }

    /// Like [`subscribe`](Self::subscribe) for callbacks that can fail.
    /// Errors are reported as subscriber failures and never propagated.
    pub fn subscribe_fallible<F, E>(&self, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: std::fmt::Display,
    {
        self.subscribers
            .register(move |snapshot| callback(snapshot).map_err(|e| e.to_string()))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Up to `limit` most recent activities (all when `None`).
    pub fn snapshot(&self, limit: Option<usize>) -> Snapshot {
        self.read_state().snapshot.truncated(limit)
    }

    /// Look up a retained activity by id.
    pub fn get(&self, id: &str) -> Option<Activity> {
        let state = self.read_state();
        let timestamp = *state.timestamps.get(id)?;
        state.ordered.get(&OrderKey::new(timestamp, id)).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_state().timestamps.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read_state().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resets so far. Pumps pin this to detect a session change.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn stats(&self) -> StoreStats {
        let (retained, generation) = {
            let state = self.read_state();
            (state.ordered.len(), state.generation)
        };
        StoreStats {
            retained,
            capacity: self.capacity,
            subscribers: self.subscribers.len(),
            generation,
            applied: self.counters.applied.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            subscriber_failures: self.subscribers.failure_count(),
        }
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Drop every retained activity, start a new generation, and notify
    /// subscribers with an empty snapshot. Called on workspace switch and
    /// logout.
    pub fn reset(&self) {
        let (cleared, generation) = {
            let mut state = self.write_state();
            let cleared = state.ordered.len();
            state.ordered.clear();
            state.timestamps.clear();
            state.generation += 1;
            let snapshot = state.rebuild_snapshot();
            self.enqueue(snapshot);
            (cleared, state.generation)
        };
        info!(cleared, generation, "Realtime store reset");
        self.drain();
    }
}

impl Default for RealtimeStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for RealtimeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeStore")
            .field("capacity", &self.capacity)
            .field("retained", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
