//! Shared test helpers for `fluffer-core` integration tests.
//!
//! In-memory implementations of every port, with call recording and failure
//! injection, plus a harness that wires them into an engine.

#![allow(dead_code)]

pub mod calendar;
pub mod notification;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fluffer_core::{EngineSettings, RsvpEngine};
use fluffer_domain::{Attendee, CalendarEvent, EventDateTime};

pub use calendar::MockCalendarSource;
pub use notification::MockSurface;
pub use store::InMemoryKeyValueStore;

/// Engine plus handles on its mocks.
pub struct Harness {
    pub calendar: Arc<MockCalendarSource>,
    pub surface: Arc<MockSurface>,
    pub kv: Arc<InMemoryKeyValueStore>,
    pub engine: Arc<RsvpEngine>,
}

impl Harness {
    pub fn new(calendar: MockCalendarSource, surface: MockSurface) -> Self {
        Self::with_kv(calendar, surface, InMemoryKeyValueStore::default())
    }

    pub fn with_kv(
        calendar: MockCalendarSource,
        surface: MockSurface,
        kv: InMemoryKeyValueStore,
    ) -> Self {
        let calendar = Arc::new(calendar);
        let surface = Arc::new(surface);
        let kv = Arc::new(kv);
        let engine = Arc::new(RsvpEngine::new(
            calendar.clone(),
            surface.clone(),
            kv.clone(),
            EngineSettings::default(),
        ));
        Self { calendar, surface, kv, engine }
    }

    /// A fresh engine over the same mocks, as after a restart.
    pub async fn restart(&self) -> Arc<RsvpEngine> {
        let engine = Arc::new(RsvpEngine::new(
            self.calendar.clone(),
            self.surface.clone(),
            self.kv.clone(),
            EngineSettings::default(),
        ));
        engine.load_settings().await.unwrap();
        engine
    }
}

/// A timed event `days` days from now lasting two hours.
pub fn event_in_days(id: &str, days: i64, description: Option<&str>) -> CalendarEvent {
    event_at(id, Utc::now() + Duration::days(days), description)
}

pub fn event_at(id: &str, start: DateTime<Utc>, description: Option<&str>) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        summary: Some(format!("Event {id}")),
        description: description.map(str::to_string),
        start: Some(EventDateTime::timed(start)),
        end: Some(EventDateTime::timed(start + Duration::hours(2))),
        ..Default::default()
    }
}

pub fn attendee<'a>(attendees: &'a [Attendee], email: &str) -> Option<&'a Attendee> {
    attendees.iter().find(|a| a.email.eq_ignore_ascii_case(email))
}
