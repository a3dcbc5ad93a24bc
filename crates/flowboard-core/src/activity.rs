//! Activity records: one user action on one target entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ACTIVITY ACTION
// =============================================================================

/// Closed set of actions a collaborator can perform on a board entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Completed,
    Commented,
    Assigned,
    Moved,
}

impl ActivityAction {
    /// Every action, in declaration order.
    pub const ALL: [ActivityAction; 7] = [
        ActivityAction::Created,
        ActivityAction::Updated,
        ActivityAction::Deleted,
        ActivityAction::Completed,
        ActivityAction::Commented,
        ActivityAction::Assigned,
        ActivityAction::Moved,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Completed => "completed",
            Self::Commented => "commented",
            Self::Assigned => "assigned",
            Self::Moved => "moved",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityAction {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            "completed" => Ok(Self::Completed),
            "commented" => Ok(Self::Commented),
            "assigned" => Ok(Self::Assigned),
            "moved" => Ok(Self::Moved),
            _ => Err(format!("Invalid activity action: {}", s)),
        }
    }
}

// =============================================================================
// ACTIVITY
// =============================================================================

/// An immutable record of one user action on one target entity.
///
/// `id` is assigned by the event source and is the dedupe key. Targets are
/// referenced by identifier only; nothing here validates that they exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub action: ActivityAction,
    pub user_id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    pub target_id: String,
    pub target_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Create an activity with empty attribution and target.
    pub fn new(id: impl Into<String>, action: ActivityAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            action,
            user_id: String::new(),
            user_name: String::new(),
            user_avatar: None,
            target_id: String::new(),
            target_name: String::new(),
            details: None,
            timestamp,
        }
    }

    /// Attribute the activity to a user.
    pub fn with_user(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.user_id = id.into();
        self.user_name = name.into();
        self
    }

    /// Set the user's avatar URL.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.user_avatar = Some(avatar.into());
        self
    }

    /// Set the entity the action was performed on.
    pub fn with_target(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.target_id = id.into();
        self.target_name = name.into();
        self
    }

    /// Attach a free-text annotation.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
