//! Integration tests for RealtimeStore behaviour.
//!
//! This test suite validates:
//! - Idempotent ingest
//! - Descending timestamp order regardless of arrival order
//! - Bounding to capacity, keeping the most recent entries
//! - Last-write-wins replacement
//! - Rejection of malformed events
//! - Notification fidelity across subscribers
//! - The capacity-3 eviction and replacement walkthrough
//! - Eviction order among equal timestamps

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use flowboard_realtime::{
    Activity, ActivityAction, Error, IngestOutcome, RawActivity, RealtimeStore, Snapshot,
    StoreConfig, DEFAULT_CAPACITY,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
}

fn event(id: &str, secs: i64) -> Activity {
    Activity::new(id, ActivityAction::Updated, ts(secs))
        .with_user("u1", "Alice")
        .with_target("t1", "Roadmap")
}

fn ids(store: &RealtimeStore) -> Vec<String> {
    store
        .snapshot(None)
        .iter()
        .map(|a| a.id.clone())
        .collect()
}

/// All orderings of `items` (Heap's algorithm).
fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    fn heap<T: Clone>(k: usize, items: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if k <= 1 {
            out.push(items.clone());
            return;
        }
        for i in 0..k {
            heap(k - 1, items, out);
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
        }
    }
    let mut out = Vec::new();
    heap(items.len(), &mut items.to_vec(), &mut out);
    out
}

// ============================================================================
// PROPERTIES
// ============================================================================

#[test]
fn test_ingest_is_idempotent() {
    for e in [event("a", 1), event("b", 2), event("c", 0)] {
        let once = RealtimeStore::with_capacity(5);
        once.ingest(event("x", 1)).unwrap();
        once.ingest(e.clone()).unwrap();

        let twice = RealtimeStore::with_capacity(5);
        twice.ingest(event("x", 1)).unwrap();
        twice.ingest(e.clone()).unwrap();
        let second = twice.ingest(e).unwrap();

        assert_eq!(second, IngestOutcome::Unchanged);
        assert_eq!(once.snapshot(None), twice.snapshot(None));
    }
}

#[test]
fn test_order_is_descending_for_every_arrival_order() {
    let events: Vec<Activity> = (1..=5).map(|i| event(&format!("e{}", i), i)).collect();

    for order in permutations(&events) {
        let store = RealtimeStore::with_capacity(10);
        for e in order {
            store.ingest(e).unwrap();
        }
        let snapshot = store.snapshot(None);
        assert!(snapshot
            .windows(2)
            .all(|pair| pair[0].timestamp > pair[1].timestamp));
        assert_eq!(ids(&store), vec!["e5", "e4", "e3", "e2", "e1"]);
    }
}

#[test]
fn test_bounded_to_most_recent_capacity_entries() {
    let events: Vec<Activity> = (1..=6).map(|i| event(&format!("e{}", i), i)).collect();

    for order in permutations(&events) {
        let store = RealtimeStore::new(StoreConfig::default().with_capacity(4));
        for e in order {
            store.ingest(e).unwrap();
        }
        assert_eq!(store.len(), 4);
        assert_eq!(ids(&store), vec!["e6", "e5", "e4", "e3"]);
    }
}

#[test]
fn test_last_write_wins() {
    let store = RealtimeStore::with_capacity(5);
    store.ingest(event("a", 1)).unwrap();
    store.ingest(event("b", 2)).unwrap();

    let newer = event("a", 3).with_details("renamed");
    assert_eq!(store.ingest(newer).unwrap(), IngestOutcome::Replaced);
    assert_eq!(store.len(), 2);
    assert_eq!(ids(&store), vec!["a", "b"]);
    assert_eq!(
        store.get("a").and_then(|a| a.details),
        Some("renamed".to_string())
    );

    let before = store.snapshot(None);
    assert_eq!(store.ingest(event("a", 3)).unwrap(), IngestOutcome::Unchanged);
    assert_eq!(store.ingest(event("a", 0)).unwrap(), IngestOutcome::Unchanged);
    assert!(store.snapshot(None).ptr_eq(&before));
}

#[test]
fn test_malformed_events_are_rejected() {
    let store = RealtimeStore::with_capacity(5);
    store.ingest(event("a", 1)).unwrap();
    let before = store.snapshot(None);

    let missing_id = RawActivity {
        action: Some("created".to_string()),
        timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        ..Default::default()
    };
    let bad_action = RawActivity {
        id: Some("z".to_string()),
        action: Some("exploded".to_string()),
        timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        ..Default::default()
    };

    for raw in [missing_id, bad_action] {
        let err = store.ingest_raw(raw).unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
        assert!(err.is_rejection());
    }
    assert!(matches!(
        store.ingest(event("", 9)),
        Err(Error::MalformedEvent(_))
    ));

    assert_eq!(store.snapshot(None), before);
    assert_eq!(store.stats().rejected, 3);
}

#[test]
fn test_subscribers_see_identical_snapshot_in_order() {
    let store = RealtimeStore::with_capacity(5);
    let calls: Arc<Mutex<Vec<(&'static str, Snapshot)>>> = Arc::default();

    let first = calls.clone();
    let _a = store.subscribe(move |s| first.lock().unwrap().push(("first", s.clone())));
    let second = calls.clone();
    let _b = store.subscribe(move |s| second.lock().unwrap().push(("second", s.clone())));

    store.ingest(event("a", 1)).unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "first");
    assert_eq!(calls[1].0, "second");
    assert!(calls[0].1.ptr_eq(&calls[1].1));
    assert!(calls[0].1.ptr_eq(&store.snapshot(None)));
}

#[test]
fn test_failing_subscriber_does_not_block_others() {
    let store = RealtimeStore::with_capacity(5);
    let seen: Arc<Mutex<usize>> = Arc::default();

    let _bad = store.subscribe_fallible(|_| Err::<(), _>("render failed"));
    let _panics = store.subscribe(|_| panic!("boom"));
    let counter = seen.clone();
    let _good = store.subscribe(move |_| *counter.lock().unwrap() += 1);

    assert_eq!(store.ingest(event("a", 1)).unwrap(), IngestOutcome::Inserted { evicted: None });
    assert_eq!(*seen.lock().unwrap(), 1);
    assert_eq!(store.stats().subscriber_failures, 2);
    assert_eq!(ids(&store), vec!["a"]);
}

#[test]
fn test_capacity_three_walkthrough() {
    let store = RealtimeStore::with_capacity(3);
    for (id, secs) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
        store.ingest(event(id, secs)).unwrap();
    }
    assert_eq!(ids(&store), vec!["d", "c", "b"]);

    assert_eq!(store.ingest(event("b", 5)).unwrap(), IngestOutcome::Replaced);
    assert_eq!(ids(&store), vec!["b", "d", "c"]);
}

#[test]
fn test_tied_timestamps_evict_largest_id_first() {
    let store = RealtimeStore::with_capacity(2);
    store.ingest(event("b", 7)).unwrap();
    store.ingest(event("a", 7)).unwrap();

    assert_eq!(
        store.ingest(event("c", 7)).unwrap(),
        IngestOutcome::Discarded
    );
    assert_eq!(ids(&store), vec!["a", "b"]);

    // A smaller id at the same timestamp displaces the largest retained one.
    assert_eq!(
        store.ingest(event("0", 7)).unwrap(),
        IngestOutcome::Inserted {
            evicted: Some("b".to_string())
        }
    );
    assert_eq!(ids(&store), vec!["0", "a"]);
}

#[test]
fn test_reset_then_reuse() {
    let store = RealtimeStore::with_capacity(3);
    store.ingest(event("a", 1)).unwrap();
    store.reset();
    assert!(store.snapshot(None).is_empty());

    store.ingest(event("a", 1)).unwrap();
    assert_eq!(ids(&store), vec!["a"]);
}

#[test]
fn test_default_capacity_under_sustained_load() {
    let store = RealtimeStore::new(StoreConfig::default());
    let capacity = store.capacity();
    assert_eq!(capacity, DEFAULT_CAPACITY);
    let events: Vec<Activity> = (0..(capacity as i64 * 2))
        .map(|i| event(&uuid::Uuid::now_v7().to_string(), i))
        .collect();
    let newest: Vec<String> = events
        .iter()
        .rev()
        .take(capacity)
        .map(|a| a.id.clone())
        .collect();

    for e in events {
        store.ingest(e).unwrap();
    }

    assert_eq!(store.len(), capacity);
    assert_eq!(ids(&store), newest);
    assert_eq!(store.stats().evicted, capacity as u64);
}
