//! Centralized default constants for the flowboard realtime subsystem.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates should reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// REALTIME STORE
// =============================================================================

/// Default number of activities retained by a realtime store.
///
/// Large enough for a scrolling feed plus notification backlog, small enough
/// that a full snapshot rebuild per change stays cheap.
pub const STORE_CAPACITY: usize = 200;

/// Environment variable overriding [`STORE_CAPACITY`].
pub const STORE_CAPACITY_ENV: &str = "REALTIME_STORE_CAPACITY";

// =============================================================================
// EVENT SOURCE
// =============================================================================

/// Default buffer capacity for the channel between event source and pump.
pub const SOURCE_CHANNEL_CAPACITY: usize = 256;

/// Table name the backend uses for activity row changes.
pub const ACTIVITY_TABLE: &str = "activities";

// =============================================================================
// PRESENTATION
// =============================================================================

/// Default number of items rendered by the activity feed.
pub const FEED_MAX_ITEMS: usize = 10;

/// Default number of items rendered by the notification centre.
pub const NOTIFICATION_MAX_ITEMS: usize = 20;

/// Seconds under which an activity is displayed as "just now".
pub const JUST_NOW_SECS: i64 = 45;

// =============================================================================
// LOGGING
// =============================================================================

/// Default `RUST_LOG` filter when none is set.
pub const LOG_FILTER: &str = "flowboard_core=info,flowboard_realtime=info";

/// Default log file name when `LOG_FILE` points at a directory.
pub const LOG_FILE_NAME: &str = "flowboard.log";
