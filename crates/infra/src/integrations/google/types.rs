//! Wire types for the Google Calendar and OAuth token endpoints.
//!
//! Event bodies deserialize straight into the domain `CalendarEvent`, whose
//! field names already follow the v3 representation.

use fluffer_domain::{Attendee, CalendarEvent};
use serde::{Deserialize, Serialize};

/// One page of `events.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
    pub next_page_token: Option<String>,
    /// Only present on the last page.
    pub next_sync_token: Option<String>,
}

/// Body of the `events.patch` call that replaces the attendee list.
#[derive(Debug, Serialize)]
pub struct AttendeePatch<'a> {
    pub attendees: &'a [Attendee],
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}
