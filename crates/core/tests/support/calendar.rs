use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fluffer_core::CalendarSource;
use fluffer_domain::{
    Attendee, CalendarEvent, ChangeBatch, EventStatus, FlufferError, Result as DomainResult,
    ResponseStatus,
};

#[derive(Default)]
struct CalendarState {
    events: BTreeMap<String, CalendarEvent>,
    /// Ids changed since the last incremental poll.
    pending: Vec<String>,
    generation: u64,
    stale: bool,
    fail_writes: bool,
    fail_polls: bool,
    poll_delay: Option<Duration>,
    polls: Vec<Option<String>>,
    writes: Vec<(String, Vec<Attendee>)>,
}

/// In-memory calendar.
///
/// A poll without a checkpoint returns every event; with one it returns the
/// events changed since the previous poll. Attendee writes count as changes,
/// the way the real calendar reports its own updates back.
#[derive(Default, Clone)]
pub struct MockCalendarSource {
    state: Arc<Mutex<CalendarState>>,
}

impl MockCalendarSource {
    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        let mock = Self::default();
        for event in events {
            mock.upsert(event);
        }
        mock
    }

    pub fn upsert(&self, event: CalendarEvent) {
        let mut state = self.state.lock().unwrap();
        state.pending.push(event.id.clone());
        state.events.insert(event.id.clone(), event);
    }

    pub fn event(&self, id: &str) -> Option<CalendarEvent> {
        self.state.lock().unwrap().events.get(id).cloned()
    }

    /// Someone answered on the calendar side.
    pub fn respond(&self, event_id: &str, email: &str, status: ResponseStatus) {
        let mut state = self.state.lock().unwrap();
        let Some(event) = state.events.get_mut(event_id) else {
            return;
        };
        match event.attendees.iter_mut().find(|a| a.email.eq_ignore_ascii_case(email)) {
            Some(attendee) => attendee.response_status = status,
            None => event.attendees.push(Attendee::new(email, status)),
        }
        state.pending.push(event_id.to_string());
    }

    pub fn cancel(&self, event_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(event) = state.events.get_mut(event_id) {
            event.status = EventStatus::Cancelled;
        }
        state.pending.push(event_id.to_string());
    }

    /// Reject the next incremental poll's checkpoint.
    pub fn expire_checkpoint(&self) {
        self.state.lock().unwrap().stale = true;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn fail_polls(&self, fail: bool) {
        self.state.lock().unwrap().fail_polls = fail;
    }

    pub fn delay_polls(&self, delay: Duration) {
        self.state.lock().unwrap().poll_delay = Some(delay);
    }

    pub fn polls(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().polls.clone()
    }

    pub fn writes(&self) -> Vec<(String, Vec<Attendee>)> {
        self.state.lock().unwrap().writes.clone()
    }
}

#[async_trait]
impl CalendarSource for MockCalendarSource {
    async fn poll_changes(&self, checkpoint: Option<&str>) -> DomainResult<ChangeBatch> {
        let delay = self.state.lock().unwrap().poll_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.polls.push(checkpoint.map(str::to_string));
        if state.fail_polls {
            return Err(FlufferError::Network("calendar unavailable".into()));
        }
        if checkpoint.is_some() && state.stale {
            state.stale = false;
            return Err(FlufferError::StaleCheckpoint("sync token expired".into()));
        }

        let ids: Vec<String> = match checkpoint {
            None => state.events.keys().cloned().collect(),
            Some(_) => {
                let mut ids = std::mem::take(&mut state.pending);
                ids.sort();
                ids.dedup();
                ids
            }
        };
        if checkpoint.is_none() {
            state.pending.clear();
        }

        let events: Vec<CalendarEvent> =
            ids.iter().filter_map(|id| state.events.get(id).cloned()).collect();
        state.generation += 1;
        Ok(ChangeBatch { events, next_checkpoint: Some(format!("cp-{}", state.generation)) })
    }

    async fn get_event(&self, event_id: &str) -> DomainResult<Option<CalendarEvent>> {
        Ok(self.state.lock().unwrap().events.get(event_id).cloned())
    }

    async fn write_attendees(
        &self,
        event_id: &str,
        attendees: &[Attendee],
    ) -> DomainResult<CalendarEvent> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(FlufferError::Network("write rejected".into()));
        }
        state.writes.push((event_id.to_string(), attendees.to_vec()));

        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| FlufferError::NotFound(format!("event {event_id}")))?;
        event.attendees = attendees.to_vec();
        let updated = event.clone();
        state.pending.push(event_id.to_string());
        Ok(updated)
    }
}
