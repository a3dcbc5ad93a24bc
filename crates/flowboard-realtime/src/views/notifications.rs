//! Notification centre: a filtered slice of the log with per-centre read state.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use flowboard_core::defaults;
use flowboard_core::{Activity, ActivityAction};

use super::presentation::{format_relative, presentation, summary};
use crate::snapshot::Snapshot;

/// Actions that raise a notification unless configured otherwise.
pub const DEFAULT_KINDS: [ActivityAction; 4] = [
    ActivityAction::Commented,
    ActivityAction::Assigned,
    ActivityAction::Completed,
    ActivityAction::Moved,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub action: ActivityAction,
    pub icon: &'static str,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub relative_time: String,
    pub read: bool,
}

/// Notification consumer.
///
/// Read state belongs to the centre, not the store: marking an entry read
/// here never changes what other consumers see. Ids that fall out of the
/// store simply stop matching.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    kinds: BTreeSet<ActivityAction>,
    max_items: usize,
    exclude_user: Option<String>,
    read: HashSet<String>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_KINDS, defaults::NOTIFICATION_MAX_ITEMS)
    }
}

impl NotificationCenter {
    pub fn new(kinds: impl IntoIterator<Item = ActivityAction>, max_items: usize) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            max_items,
            exclude_user: None,
            read: HashSet::new(),
        }
    }

    /// Hide activities performed by `user_id` (the signed-in user's own actions).
    pub fn excluding_user(mut self, user_id: impl Into<String>) -> Self {
        self.exclude_user = Some(user_id.into());
        self
    }

    pub fn kinds(&self) -> impl Iterator<Item = ActivityAction> + '_ {
        self.kinds.iter().copied()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    fn accepts(&self, activity: &Activity) -> bool {
        self.kinds.contains(&activity.action)
            && self
                .exclude_user
                .as_deref()
                .map_or(true, |user| activity.user_id != user)
    }

    fn visible<'a>(&'a self, snapshot: &'a Snapshot) -> impl Iterator<Item = &'a Activity> + 'a {
        snapshot
            .iter()
            .filter(|activity| self.accepts(activity))
            .take(self.max_items)
    }

    /// Matching entries in snapshot order, capped at `max_items`.
    pub fn render(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Notification> {
        self.visible(snapshot)
            .map(|activity| {
                let look = presentation(activity.action);
                Notification {
                    id: activity.id.clone(),
                    action: activity.action,
                    icon: look.icon,
                    title: summary(activity),
                    body: activity.details.clone(),
                    relative_time: format_relative(activity.timestamp, now),
                    read: self.read.contains(&activity.id),
                }
            })
            .collect()
    }

    /// Returns `false` if the id was already marked.
    pub fn mark_read(&mut self, id: impl Into<String>) -> bool {
        self.read.insert(id.into())
    }

    /// Mark everything currently visible in `snapshot` as read.
    pub fn mark_all_read(&mut self, snapshot: &Snapshot) {
        let ids: Vec<String> = self.visible(snapshot).map(|a| a.id.clone()).collect();
        self.read.extend(ids);
    }

    /// Visible entries in `snapshot` not yet marked read.
    pub fn unread_count(&self, snapshot: &Snapshot) -> usize {
        self.visible(snapshot)
            .filter(|activity| !self.read.contains(&activity.id))
            .count()
    }

    /// Drop read marks for ids no longer in `snapshot`.
    pub fn prune(&mut self, snapshot: &Snapshot) {
        let live: HashSet<&str> = snapshot.iter().map(|a| a.id.as_str()).collect();
        self.read.retain(|id| live.contains(id.as_str()));
    }
}
