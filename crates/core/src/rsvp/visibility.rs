//! Visibility and lifecycle state of a record.
//!
//! ```text
//! upcoming ──(further out than the limit, nobody invited, no invite wave)──> hidden
//! upcoming ──(start reached)──> started ──(end reached)──> past
//! any ──(calendar cancellation)──> cancelled   (terminal)
//! ```

use chrono::{DateTime, Duration, Utc};
use fluffer_domain::constants::{FROM_NOW_PAST, FROM_NOW_STARTED};
use fluffer_domain::{relative_time, RsvpRecord};

/// Recompute `past`, `hide` and `from_now`.
///
/// Returns whether any of them changed. Cancelled records are left alone.
pub fn refresh(record: &mut RsvpRecord, now: DateTime<Utc>, future_limit: Duration) -> bool {
    if record.cancelled {
        return false;
    }

    let past = match record.end {
        Some(end) => end < now,
        None => record.start < now,
    };
    let started = record.start <= now;
    // `posted` is sticky: once invites went out, uninvites never hide it again.
    let unannounced = record.invited.is_empty() && !record.posted;
    let hide = past || (record.start > now + future_limit && unannounced);
    let from_now = if past {
        FROM_NOW_PAST.to_string()
    } else if started {
        FROM_NOW_STARTED.to_string()
    } else {
        relative_time(record.start, now)
    };

    let changed = record.past != past || record.hide != hide || record.from_now != from_now;
    record.past = past;
    record.hide = hide;
    record.from_now = from_now;
    changed
}
