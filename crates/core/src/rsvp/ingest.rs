//! Record ingestion: fold a calendar event into its RSVP record.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use fluffer_domain::constants::DEFAULT_TITLE;
use fluffer_domain::{parse_directives, CalendarEvent, EventDateTime, RsvpRecord};
use tracing::{debug, warn};

use super::ports::NotificationSurface;

/// Knobs that shape ingestion.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Timezone all-day dates are anchored in.
    pub tz: Tz,
    /// Start moves beyond this force the announcement to be recreated.
    pub materiality: Duration,
}

/// Fold `event` into `existing`.
///
/// Returns `None` when there is nothing to track: a cancelled event that was
/// never seen, or an event without a usable start.
pub fn apply_event(
    existing: Option<RsvpRecord>,
    event: &CalendarEvent,
    options: &IngestOptions,
) -> Option<RsvpRecord> {
    if event.is_cancelled() {
        return existing.map(|mut record| {
            record.cancelled = true;
            record
        });
    }

    let Some((start, end, all_day)) = event_times(event, options.tz) else {
        warn!(event_id = %event.id, "Event has no usable start; ignoring");
        return existing;
    };

    let mut record = match existing {
        Some(mut record) => {
            if (start - record.start).abs() > options.materiality {
                debug!(event_id = %event.id, "Start moved materially");
                record.significant_change = true;
            }
            record.start = start;
            record
        }
        None => RsvpRecord::new(event.id.clone(), start),
    };

    record.cancelled = false;
    record.end = end;
    record.all_day = all_day;
    record.title = event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    record.location =
        event.location.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let directives = parse_directives(event.description.as_deref());
    if record.invite.is_some() && record.invite != directives.invite {
        debug!(
            event_id = %event.id,
            from = ?record.invite,
            to = ?directives.invite,
            "Invite group changed"
        );
        record.significant_change = true;
    }
    record.description = directives.description;
    record.image = directives.image;
    record.invite = directives.invite;

    Some(record)
}

/// Resolve `(start, end, all_day)` from the event's time fields.
pub fn event_times(
    event: &CalendarEvent,
    tz: Tz,
) -> Option<(DateTime<Utc>, Option<DateTime<Utc>>, bool)> {
    let start = event.start.as_ref()?;
    let (start, all_day) = resolve(start, tz)?;
    let end = event.end.as_ref().and_then(|end| resolve(end, tz)).map(|(end, _)| end);
    Some((start, end, all_day))
}

fn resolve(value: &EventDateTime, tz: Tz) -> Option<(DateTime<Utc>, bool)> {
    if let Some(at) = value.date_time {
        return Some((at.with_timezone(&Utc), false));
    }
    value.date.map(|date| (local_midnight(date, tz), true))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Take the record's color from its invite group, once.
///
/// Unknown groups and lookup failures leave the record uncolored.
pub async fn resolve_color(record: &mut RsvpRecord, surface: &dyn NotificationSurface) {
    if record.color.is_some() {
        return;
    }
    let Some(invite) = record.invite.clone() else {
        return;
    };

    match surface.resolve_group(&invite).await {
        Ok(Some(group)) => record.color = group.color,
        Ok(None) => warn!(event_id = %record.event_id, group = %invite, "Unknown invite group"),
        Err(e) => warn!(event_id = %record.event_id, error = %e, "Failed to resolve group color"),
    }
}
