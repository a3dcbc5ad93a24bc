//! Display lookup tables keyed by action, and relative time formatting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use flowboard_core::defaults;
use flowboard_core::{Activity, ActivityAction};

/// How an action is drawn in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionPresentation {
    /// Icon name from the dashboard's icon set.
    pub icon: &'static str,
    /// Colour token used for the icon badge.
    pub color: &'static str,
    /// Verb phrase placed between actor and target ("moved", "commented on").
    pub verb: &'static str,
}

/// Presentation for `action`.
pub fn presentation(action: ActivityAction) -> ActionPresentation {
    let (icon, color, verb) = match action {
        ActivityAction::Created => ("plus", "green", "created"),
        ActivityAction::Updated => ("edit", "blue", "updated"),
        ActivityAction::Deleted => ("trash", "red", "deleted"),
        ActivityAction::Completed => ("check-circle", "emerald", "completed"),
        ActivityAction::Commented => ("message-square", "purple", "commented on"),
        ActivityAction::Assigned => ("user-plus", "orange", "assigned"),
        ActivityAction::Moved => ("arrow-right", "indigo", "moved"),
    };
    ActionPresentation { icon, color, verb }
}

/// One-line attribution shared by every view: "Alice moved Fix login bug".
///
/// Missing names read as "Someone" and "an item".
pub fn summary(activity: &Activity) -> String {
    let actor = if activity.user_name.is_empty() {
        "Someone"
    } else {
        activity.user_name.as_str()
    };
    let verb = presentation(activity.action).verb;
    if activity.target_name.is_empty() {
        format!("{} {} an item", actor, verb)
    } else {
        format!("{} {} {}", actor, verb, activity.target_name)
    }
}

/// Human-readable distance from `timestamp` to `now` ("3 minutes ago").
///
/// Timestamps in the future (clock skew between clients) read as "just now".
pub fn format_relative(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - timestamp).num_seconds();
    if secs < defaults::JUST_NOW_SECS {
        return "just now".to_string();
    }

    let minutes = (secs + 30) / 60;
    let (value, unit) = if minutes < 60 {
        (minutes.max(1), "minute")
    } else if minutes < 60 * 24 {
        (minutes / 60, "hour")
    } else if minutes < 60 * 24 * 30 {
        (minutes / (60 * 24), "day")
    } else if minutes < 60 * 24 * 365 {
        (minutes / (60 * 24 * 30), "month")
    } else {
        (minutes / (60 * 24 * 365), "year")
    };

    if value == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", value, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap()
    }

    fn ago(d: Duration) -> String {
        format_relative(now() - d, now())
    }

    #[test]
    fn test_every_action_has_presentation() {
        let mut icons = std::collections::HashSet::new();
        for action in ActivityAction::ALL {
            let p = presentation(action);
            assert!(!p.verb.is_empty());
            assert!(icons.insert(p.icon), "duplicate icon for {}", action);
        }
    }

    #[test]
    fn test_comment_verb_reads_naturally() {
        assert_eq!(presentation(ActivityAction::Commented).verb, "commented on");
    }

    #[test]
    fn test_summary() {
        let full = Activity::new("a", ActivityAction::Commented, now())
            .with_user("u1", "Alice")
            .with_target("t1", "Release notes");
        assert_eq!(summary(&full), "Alice commented on Release notes");

        let bare = Activity::new("b", ActivityAction::Deleted, now());
        assert_eq!(summary(&bare), "Someone deleted an item");
    }

    #[test]
    fn test_just_now() {
        assert_eq!(ago(Duration::seconds(0)), "just now");
        assert_eq!(ago(Duration::seconds(44)), "just now");
        assert_eq!(ago(Duration::seconds(-30)), "just now");
    }

    #[test]
    fn test_minutes() {
        assert_eq!(ago(Duration::seconds(45)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(3)), "3 minutes ago");
        assert_eq!(ago(Duration::minutes(59)), "59 minutes ago");
    }

    #[test]
    fn test_hours_days_months_years() {
        assert_eq!(ago(Duration::minutes(60)), "1 hour ago");
        assert_eq!(ago(Duration::hours(5)), "5 hours ago");
        assert_eq!(ago(Duration::days(1)), "1 day ago");
        assert_eq!(ago(Duration::days(12)), "12 days ago");
        assert_eq!(ago(Duration::days(60)), "2 months ago");
        assert_eq!(ago(Duration::days(800)), "2 years ago");
    }
}
