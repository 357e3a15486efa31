//! Human relative-time strings ("in 3 days", "2 hours ago").
//!
//! Thresholds follow the conventional humanize buckets: each unit is rounded
//! and promoted to the next one once it crosses the bucket limit.

use chrono::{DateTime, Utc};

/// Describe `target` relative to `now`.
pub fn relative_time(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = target.signed_duration_since(now);
    let future = delta.num_milliseconds() >= 0;
    let phrase = humanize(delta.num_seconds().unsigned_abs());

    if future {
        format!("in {phrase}")
    } else {
        format!("{phrase} ago")
    }
}

fn humanize(total_seconds: u64) -> String {
    let seconds = total_seconds as f64;
    let minutes = (seconds / 60.0).round();
    let hours = (seconds / 3_600.0).round();
    let days = (seconds / 86_400.0).round();
    let months = (seconds / 86_400.0 * 4_800.0 / 146_097.0).round();
    let years = (seconds / 86_400.0 / 365.0).round();

    if seconds < 45.0 {
        "a few seconds".to_string()
    } else if minutes <= 1.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{minutes} minutes")
    } else if hours <= 1.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{hours} hours")
    } else if days <= 1.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{days} days")
    } else if months <= 1.0 {
        "a month".to_string()
    } else if months < 11.0 {
        format!("{months} months")
    } else if years <= 1.0 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}
