//! Presentation consumers over store snapshots.
//!
//! Views are pure functions of a [`Snapshot`](crate::snapshot::Snapshot) plus
//! their own limits and filters. They never write back into the store, and
//! two views over the same snapshot do not affect each other.

pub mod feed;
pub mod notifications;
pub mod presentation;

pub use feed::{ActivityFeed, FeedItem};
pub use notifications::{Notification, NotificationCenter};
pub use presentation::{format_relative, presentation, summary, ActionPresentation};
