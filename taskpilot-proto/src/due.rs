//! Due-date arithmetic: days until due, urgency tiers and reminder matching.
//!
//! Everything here works at calendar-day granularity. Both the due timestamp
//! and "now" are reduced to their date in the caller's time zone, so the
//! time of day on either side never changes the result.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Whole calendar days from `now` until `due`, in `now`'s time zone.
///
/// Negative when overdue, zero when due today.
#[must_use]
pub fn days_until_due<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> i64 {
    let today = now.date_naive();
    let due_day = due.with_timezone(&now.timezone()).date_naive();
    due_day.signed_duration_since(today).num_days()
}

/// How pressing a task is, derived from its days until due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Due within a day, or overdue.
    High,
    /// Due in two or three days.
    Medium,
    /// Due later than that.
    Low,
}

impl Urgency {
    /// Tier for a given number of days until due.
    #[must_use]
    pub const fn from_days(days_until_due: i64) -> Self {
        if days_until_due <= 1 {
            Self::High
        } else if days_until_due <= 3 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Urgency of a task due at `due`, as seen from `now`.
#[must_use]
pub fn urgency<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> Urgency {
    Urgency::from_days(days_until_due(due, now))
}

/// Whether a reminder should go out today.
///
/// This is a membership test, so offsets `[3, 1]` fire on exactly those two
/// days and stay quiet in between. Completed tasks must be filtered out by
/// the caller.
#[must_use]
pub fn is_reminder_due(days_until_due: i64, offsets: &[u32]) -> bool {
    offsets
        .iter()
        .any(|&offset| i64::from(offset) == days_until_due)
}

/// Short human label for a days-until-due value.
#[must_use]
pub fn due_label(days_until_due: i64) -> String {
    match days_until_due {
        d if d < 0 => "Overdue".to_string(),
        0 => "Due today".to_string(),
        1 => "Due in 1 day".to_string(),
        d => format!("Due in {d} days"),
    }
}

/// Formats the due date as a calendar date (`Jun 1, 2025`) in `tz`.
#[must_use]
pub fn format_due_date<Tz>(due: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    due.with_timezone(tz).format("%b %-d, %Y").to_string()
}
