//! # flowboard-core
//!
//! Core types for the flowboard realtime activity subsystem.
//!
//! This crate provides the activity data model, decoding of the backend's
//! realtime change payloads, the shared error type, default constants, and
//! the structured-logging schema that the other flowboard crates depend on.

pub mod activity;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;

// Re-export commonly used types at crate root
pub use activity::{Activity, ActivityAction};
pub use error::{Error, Result};
pub use events::{ChangeKind, ChangePayload, RawActivity};
