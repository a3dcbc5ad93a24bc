//! Dashboard activity feed.

use chrono::{DateTime, Utc};
use serde::Serialize;

use flowboard_core::defaults;
use flowboard_core::{Activity, ActivityAction};

use super::presentation::{format_relative, presentation, summary};
use crate::snapshot::Snapshot;
use crate::store::RealtimeStore;
use crate::subscription::Subscription;

/// One rendered row of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub action: ActivityAction,
    pub icon: &'static str,
    pub color: &'static str,
    /// "Alice moved Fix login bug"
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub relative_time: String,
}

impl FeedItem {
    fn render(activity: &Activity, now: DateTime<Utc>) -> Self {
        let look = presentation(activity.action);
        Self {
            id: activity.id.clone(),
            action: activity.action,
            icon: look.icon,
            color: look.color,
            summary: summary(activity),
            details: activity.details.clone(),
            user_avatar: activity.user_avatar.clone(),
            relative_time: format_relative(activity.timestamp, now),
        }
    }
}

/// Most recent activity across the workspace, capped at `max_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityFeed {
    pub max_items: usize,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self {
            max_items: defaults::FEED_MAX_ITEMS,
        }
    }
}

impl ActivityFeed {
    pub fn new(max_items: usize) -> Self {
        Self { max_items }
    }

    /// Render the first `max_items` entries of `snapshot`, in snapshot order.
    pub fn render(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<FeedItem> {
        snapshot
            .iter()
            .take(self.max_items)
            .map(|activity| FeedItem::render(activity, now))
            .collect()
    }

    /// Re-render on every store change and hand the rows to `on_render`.
    pub fn watch<F>(self, store: &RealtimeStore, on_render: F) -> Subscription
    where
        F: Fn(Vec<FeedItem>) + Send + Sync + 'static,
    {
        store.subscribe(move |snapshot| on_render(self.render(snapshot, Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::{Arc, Mutex};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap()
    }

    fn moved(id: &str, minutes_ago: i64) -> Activity {
        Activity::new(id, ActivityAction::Moved, now() - Duration::minutes(minutes_ago))
            .with_user("u1", "Alice")
            .with_target("t1", "Fix login bug")
    }

    #[test]
    fn test_render_row() {
        let store = RealtimeStore::with_capacity(10);
        store.ingest(moved("a", 3).with_details("To Done")).unwrap();

        let items = ActivityFeed::default().render(&store.snapshot(None), now());

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.summary, "Alice moved Fix login bug");
        assert_eq!(item.icon, "arrow-right");
        assert_eq!(item.details.as_deref(), Some("To Done"));
        assert_eq!(item.relative_time, "3 minutes ago");
    }

    #[test]
    fn test_render_caps_at_max_items() {
        let store = RealtimeStore::with_capacity(10);
        for i in 0..6 {
            store.ingest(moved(&format!("a{}", i), i)).unwrap();
        }

        let items = ActivityFeed::new(4).render(&store.snapshot(None), now());

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a1", "a2", "a3"]);
    }

    #[test]
    fn test_summary_without_attribution() {
        let bare = Activity::new("x", ActivityAction::Deleted, now());
        let item = FeedItem::render(&bare, now());
        assert_eq!(item.summary, "Someone deleted an item");
    }

    #[test]
    fn test_watch_renders_on_change() {
        let store = RealtimeStore::with_capacity(10);
        let rendered: Arc<Mutex<Vec<Vec<FeedItem>>>> = Arc::default();
        let sink = rendered.clone();

        let _sub = ActivityFeed::new(2).watch(&store, move |items| {
            sink.lock().unwrap().push(items);
        });
        store.ingest(moved("a", 2)).unwrap();
        store.ingest(moved("b", 1)).unwrap();
        store.ingest(moved("c", 0)).unwrap();

        let rounds = rendered.lock().unwrap();
        assert_eq!(rounds.len(), 3);
        let last: Vec<_> = rounds[2].iter().map(|i| i.id.as_str()).collect();
        assert_eq!(last, vec!["c", "b"]);
    }

    #[test]
    fn test_serializes_camel_case() {
        let item = FeedItem::render(&moved("a", 0), now());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["relativeTime"], "just now");
        assert_eq!(json["action"], "moved");
        assert!(json.get("userAvatar").is_none());
    }
}
