//! # flowboard-realtime
//!
//! Realtime activity log for the flowboard dashboard.
//!
//! This crate provides:
//! - A bounded, deduplicated, timestamp-ordered activity store
//! - Synchronous fan-out of immutable snapshots to subscribers
//! - Event source adapters and a pump that feeds the store
//! - Session lifecycle (workspace switch, logout)
//! - Feed and notification views over snapshots
//!
//! ## Example
//!
//! ```ignore
//! use flowboard_realtime::{ActivityFeed, RealtimeStore, StoreConfig, WorkspaceSession};
//!
//! let session = WorkspaceSession::new(StoreConfig::from_env());
//! session.switch_workspace("ws-1");
//!
//! // Render the feed on every change
//! let _feed = ActivityFeed::default().watch(session.store(), |items| {
//!     println!("{} rows", items.len());
//! });
//!
//! // Feed the store from the backend's change channel
//! let (tx, rx) = flowboard_realtime::change_channel();
//! let handle = session.attach(rx);
//! let report = handle.await?;
//! ```

pub mod config;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod subscription;
pub mod views;

// Re-export core types
pub use flowboard_core::*;

pub use config::StoreConfig;
pub use session::WorkspaceSession;
pub use snapshot::Snapshot;
pub use source::{
    change_channel, payload_stream, EventSource, IngestPump, PumpReport, SourceMessage,
};
pub use store::{IngestOutcome, RealtimeStore, StoreStats};
pub use subscription::{DeliveryReport, SubscriberId, Subscription};
pub use views::{
    format_relative, presentation, summary, ActionPresentation, ActivityFeed, FeedItem,
    Notification, NotificationCenter,
};

/// Default number of activities retained.
pub const DEFAULT_CAPACITY: usize = flowboard_core::defaults::STORE_CAPACITY;
