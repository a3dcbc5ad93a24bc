//! Realtime change payloads pushed by the hosted backend.
//!
//! The backend streams Postgres-style row changes over a long-lived channel.
//! Only the `activities` table is of interest here. Each message looks like:
//!
//! ```text
//! {"eventType":"INSERT","schema":"public","table":"activities",
//!  "commit_timestamp":"2024-05-01T10:00:00Z",
//!  "new":{"id":"...","action":"moved","user_id":"...",...},
//!  "old":{}}
//! ```
//!
//! Row decoding is lenient ([`RawActivity`] has every field
//! optional) so that validation, not serde, decides what is malformed and can
//! say which field was wrong.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{Activity, ActivityAction};
use crate::error::{Error, Result};

// ============================================================================
// Change envelope
// ============================================================================

/// Kind of row change reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-change message from the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePayload {
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Commit time of the row change. Used when the row has no timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<String>,
    /// Row image after the change (empty for deletes).
    #[serde(default)]
    pub new: RawActivity,
    /// Row image before the change, as sent. Never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<serde_json::Value>,
}

impl ChangePayload {
    /// Parse a payload from its JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build an `INSERT` payload carrying `activity`.
    ///
    /// Used for locally originated (optimistic) activities and fixtures.
    pub fn insert(activity: &Activity) -> Self {
        Self {
            kind: ChangeKind::Insert,
            schema: Some("public".to_string()),
            table: Some(crate::defaults::ACTIVITY_TABLE.to_string()),
            commit_timestamp: None,
            new: RawActivity::from(activity),
            old: None,
        }
    }

    /// Whether this change concerns the activity table. Payloads without a
    /// table name are assumed to.
    pub fn is_activity_row(&self) -> bool {
        self.table
            .as_deref()
            .map_or(true, |table| table == crate::defaults::ACTIVITY_TABLE)
    }

    /// Derive the activity this change describes.
    ///
    /// Inserts and updates yield `Some(activity)`. Deletes yield `None`: the
    /// feed is append-only, a removed row does not retract history.
    pub fn into_activity(self) -> Result<Option<Activity>> {
        match self.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let fallback = match self.commit_timestamp.as_deref() {
                    Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                        Error::malformed(format!("invalid commit_timestamp: {}", raw))
                    })?),
                    None => None,
                };
                self.new.validate_with_fallback(fallback).map(Some)
            }
            ChangeKind::Delete => Ok(None),
        }
    }
}

// ============================================================================
// Raw row
// ============================================================================

/// Activity row as received, before validation.
///
/// Accepts both snake_case column names and the camelCase names the UI uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawActivity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, alias = "userName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, alias = "userAvatar", skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    #[serde(default, alias = "targetId", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, alias = "targetName", skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(
        default,
        alias = "created_at",
        alias = "createdAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
}

impl RawActivity {
    /// Validate into an [`Activity`].
    ///
    /// Requires a non-empty `id`, an `action` from the closed set, and a
    /// parseable `timestamp`.
    pub fn validate(self) -> Result<Activity> {
        self.validate_with_fallback(None)
    }

    /// Validate, using `fallback` when the row carries no timestamp.
    pub fn validate_with_fallback(self, fallback: Option<DateTime<Utc>>) -> Result<Activity> {
        let id = match self.id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(Error::malformed("missing id")),
        };

        let action = match self.action.as_deref() {
            Some(raw) => raw.parse::<ActivityAction>().map_err(|_| {
                Error::malformed(format!("unknown action '{}' for activity {}", raw, id))
            })?,
            None => return Err(Error::malformed(format!("missing action for activity {}", id))),
        };

        let timestamp = match self.timestamp.as_deref() {
            Some(raw) => parse_timestamp(raw).ok_or_else(|| {
                Error::malformed(format!("invalid timestamp '{}' for activity {}", raw, id))
            })?,
            None => fallback
                .ok_or_else(|| Error::malformed(format!("missing timestamp for activity {}", id)))?,
        };

        Ok(Activity {
            id,
            action,
            user_id: self.user_id.unwrap_or_default(),
            user_name: self.user_name.unwrap_or_default(),
            user_avatar: self.user_avatar.filter(|a| !a.is_empty()),
            target_id: self.target_id.unwrap_or_default(),
            target_name: self.target_name.unwrap_or_default(),
            details: self.details.filter(|d| !d.is_empty()),
            timestamp,
        })
    }
}

impl From<&Activity> for RawActivity {
    fn from(activity: &Activity) -> Self {
        Self {
            id: Some(activity.id.clone()),
            action: Some(activity.action.as_str().to_string()),
            user_id: Some(activity.user_id.clone()),
            user_name: Some(activity.user_name.clone()),
            user_avatar: activity.user_avatar.clone(),
            target_id: Some(activity.target_id.clone()),
            target_name: Some(activity.target_name.clone()),
            details: activity.details.clone(),
            timestamp: Some(activity.timestamp.to_rfc3339()),
        }
    }
}

/// Parse RFC 3339 or the Postgres text form (`2024-05-01 10:00:00.123+00`).
/// Naive timestamps are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Tests
// ============================================================================
