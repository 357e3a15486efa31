//! Pure projection of a record into chat payloads.

use chrono::Duration;
use chrono_tz::Tz;
use fluffer_domain::constants::{
    DEFAULT_SCHEDULED_EVENT_DURATION_MINS, FOOTER_ICON_URL, NO_EMOJI, NO_RESPONSE_EMOJI,
    YES_EMOJI, ZOOM_EMOJI,
};
use fluffer_domain::{MessagePayload, PayloadField, RsvpRecord, ScheduledEventPayload};

use super::when::format_when;

/// Discord mention markup for a user.
pub fn mention(user: &str) -> String {
    format!("<@{user}>")
}

/// Render the announcement message for `record`.
pub fn render_message(record: &RsvpRecord, tz: Tz) -> MessagePayload {
    let mut going = Vec::new();
    let mut remote = Vec::new();
    let mut not_going = Vec::new();
    let mut no_response = Vec::new();

    for user in &record.invited {
        let bucket = if record.zoom.contains(user) {
            &mut remote
        } else if record.yes.contains(user) {
            &mut going
        } else if record.no.contains(user) {
            &mut not_going
        } else {
            &mut no_response
        };
        bucket.push(mention(user));
    }

    let mut fields =
        vec![PayloadField::new("When", format_when(record.start, record.end, record.all_day, tz))];
    if let Some(location) = &record.location {
        fields.push(PayloadField::new("Where", location.clone()));
    }
    fields.push(PayloadField::new("Going", line(YES_EMOJI, &going)));
    fields.push(PayloadField::new("Remote", line(ZOOM_EMOJI, &remote)));
    fields.push(PayloadField::new("Not Going", line(NO_EMOJI, &not_going)));
    fields.push(PayloadField::new("No Response", line(NO_RESPONSE_EMOJI, &no_response)));

    MessagePayload {
        title: record.title.clone(),
        description: record.description.clone(),
        image: record.image.clone(),
        color: record.color,
        fields,
        footer: format!("{}\n{}", record.from_now, record.event_id),
        footer_icon: Some(FOOTER_ICON_URL.to_string()),
    }
}

/// Render the companion scheduled event. Events without an end last an hour.
pub fn render_scheduled_event(record: &RsvpRecord) -> ScheduledEventPayload {
    ScheduledEventPayload {
        name: record.title.clone(),
        description: record.description.clone(),
        start: record.start,
        end: record
            .end
            .unwrap_or(record.start + Duration::minutes(DEFAULT_SCHEDULED_EVENT_DURATION_MINS)),
        location: record.location.clone(),
    }
}

fn line(emoji: &str, mentions: &[String]) -> String {
    if mentions.is_empty() {
        emoji.to_string()
    } else {
        format!("{emoji} {}", mentions.join(" "))
    }
}
