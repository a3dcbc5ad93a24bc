//! Immutable, ordered views of the activity log.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use flowboard_core::Activity;

/// Read-only ordered view of the store at one point in time, most recent first.
///
/// Cloning is a reference-count bump. Every subscriber in one delivery round
/// receives a clone of the same allocation (see [`Snapshot::ptr_eq`]), and no
/// API hands out mutable access to the entries.
#[derive(Debug, Clone)]
pub struct Snapshot(Arc<[Activity]>);

impl Snapshot {
    /// A snapshot with no entries.
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub(crate) fn from_vec(entries: Vec<Activity>) -> Self {
        Self(Arc::from(entries))
    }

    /// Most recent activity, if any.
    pub fn latest(&self) -> Option<&Activity> {
        self.0.first()
    }

    /// True when both snapshots share the same allocation.
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The first `limit` entries, or the whole snapshot when `limit` is `None`
    /// or not smaller than its length. Never copies in the latter case.
    pub fn truncated(&self, limit: Option<usize>) -> Snapshot {
        match limit {
            Some(n) if n < self.0.len() => Self(Arc::from(self.0[..n].to_vec())),
            _ => self.clone(),
        }
    }

    /// Activity ids in display order.
    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|a| a.id.as_str()).collect()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for Snapshot {
    type Target = [Activity];

    fn deref(&self) -> &[Activity] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Activity;
    type IntoIter = std::slice::Iter<'a, Activity>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0[..] == other.0[..]
    }
}

impl Eq for Snapshot {}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}
