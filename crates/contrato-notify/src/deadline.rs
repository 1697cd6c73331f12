//! Remaining-days arithmetic and urgency classification.
//!
//! Timestamps come from user input and may or may not carry a zone. Naive
//! values are read as UTC so that every comparison happens on one basis.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a stored timestamp into a UTC instant. Returns `None` for anything
/// unrecognised.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // "2025-01-10 00:00:00+00:00" and friends
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    // A trailing Z on a value RFC 3339 rejected (e.g. missing seconds).
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(ndt.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Whole days between `reference` and the end timestamp, floored and never
/// negative. Zero means "due today" as well as "already overdue".
pub fn remaining_days(end_timestamp: &str, reference: DateTime<Utc>) -> Option<i64> {
    let end = parse_timestamp(end_timestamp)?;
    Some(days_between(reference, end))
}

fn days_between(reference: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    // num_days truncates toward zero, which equals floor once clamped at zero.
    (end - reference).num_days().max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyTier {
    Critical,
    Warning,
    Normal,
}

impl UrgencyTier {
    pub const CRITICAL_BELOW: i64 = 7;
    pub const WARNING_BELOW: i64 = 30;

    pub fn from_remaining_days(days: i64) -> Self {
        if days < Self::CRITICAL_BELOW {
            Self::Critical
        } else if days < Self::WARNING_BELOW {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    /// Tier for a stored end timestamp, or `None` when the date is unreadable.
    pub fn for_deadline(end_timestamp: &str, reference: DateTime<Utc>) -> Option<Self> {
        remaining_days(end_timestamp, reference).map(Self::from_remaining_days)
    }
}

/// Where an end date sits relative to today, at calendar-day granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    Overdue,
    /// Ends today or within the horizon.
    Expiring,
    Later,
    Unknown,
}

pub fn expiry_state(end_timestamp: &str, reference: DateTime<Utc>, horizon_days: u64) -> ExpiryState {
    let Some(end) = parse_timestamp(end_timestamp) else {
        return ExpiryState::Unknown;
    };

    let today = reference.date_naive();
    let end_day = end.date_naive();
    let limit = today.checked_add_days(Days::new(horizon_days)).unwrap_or(NaiveDate::MAX);

    if end_day < today {
        ExpiryState::Overdue
    } else if end_day <= limit {
        ExpiryState::Expiring
    } else {
        ExpiryState::Later
    }
}

/// `dd/mm/YYYY HH:MM` in UTC; unreadable values are shown as stored.
pub fn format_display(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%d/%m/%Y %H:%M").to_string(),
        None => raw.to_string(),
    }
}
