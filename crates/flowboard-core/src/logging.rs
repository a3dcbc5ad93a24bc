//! Structured logging schema, field name constants, and tracing bootstrap.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Rejected events, failing subscribers, lagging sources |
//! | INFO  | Lifecycle events (source connect/disconnect, store reset) |
//! | DEBUG | Decision points (duplicate absorbed, eviction, replacement) |
//! | TRACE | Per-subscriber delivery |

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::defaults;
use crate::error::{Error, Result};

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "realtime", "source", "session", "views"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "ingest", "reset", "subscribe", "pump"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Activity identifier being ingested.
pub const ACTIVITY_ID: &str = "activity_id";

/// Activity action (created, moved, ...).
pub const ACTION: &str = "action";

/// Subscriber identifier within a store.
pub const SUBSCRIBER_ID: &str = "subscriber_id";

/// Workspace identifier owning a store.
pub const WORKSPACE_ID: &str = "workspace_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Number of entries retained after an operation.
pub const RETAINED: &str = "retained";

/// Number of subscribers notified in a delivery round.
pub const SUBSCRIBER_COUNT: &str = "subscriber_count";

/// Number of events a lagging receiver missed.
pub const MISSED: &str = "missed";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Ingest outcome ("inserted", "replaced", "unchanged", "discarded").
pub const OUTCOME: &str = "outcome";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Initialize tracing from the environment.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `RUST_LOG` | [`defaults::LOG_FILTER`] | Standard env filter |
/// | `LOG_FORMAT` | `text` | `json` or `text` |
/// | `LOG_ANSI` | auto | `true`/`false` override ANSI colors |
/// | `LOG_FILE` | unset | Enables daily-rotated file logging |
///
/// Returns the appender guard when file logging is enabled; keep it alive for
/// the lifetime of the process or buffered lines are lost.
pub fn init() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| defaults::LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let path = Path::new(path);
        let file_dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(defaults::LOG_FILE_NAME);
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        } else {
            // no ANSI in files unless explicitly requested
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry
                .with(layer)
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry
                .with(layer)
                .try_init()
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        None
    };

    tracing::info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_unique() {
        let fields = [
            SUBSYSTEM,
            OPERATION,
            ACTIVITY_ID,
            ACTION,
            SUBSCRIBER_ID,
            WORKSPACE_ID,
            RETAINED,
            SUBSCRIBER_COUNT,
            MISSED,
            OUTCOME,
            ERROR_MSG,
        ];
        let unique: std::collections::HashSet<_> = fields.iter().collect();
        assert_eq!(unique.len(), fields.len());
    }

    #[test]
    fn test_init_twice_reports_config_error() {
        // Only one global subscriber may be installed per process.
        let _first = init();
        let second = init();
        assert!(matches!(second, Err(Error::Config(_))));
    }
}
