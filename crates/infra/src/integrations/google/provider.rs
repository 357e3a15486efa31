//! `CalendarSource` over the Google Calendar v3 REST API.
//!
//! Incremental sync follows the `syncToken` protocol: a poll without a
//! checkpoint enumerates every event, later polls only return what changed.
//! Every page is followed before the new checkpoint is handed out. Events are
//! mirrored into the key/value store under `event/<id>` so point lookups do
//! not need a round trip.

use std::sync::Arc;

use async_trait::async_trait;
use fluffer_core::{CalendarSource, KeyValueStore};
use fluffer_domain::constants::EVENT_CACHE_KEY_PREFIX;
use fluffer_domain::{Attendee, CalendarConfig, CalendarEvent, ChangeBatch, FlufferError, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::auth::GoogleTokenProvider;
use super::types::{AttendeePatch, EventsPage};
use crate::http::HttpClient;
use crate::redact::redact_email;

pub struct GoogleCalendarSource {
    http: HttpClient,
    auth: GoogleTokenProvider,
    base_url: String,
    calendar_id: String,
    cache: Option<Arc<dyn KeyValueStore>>,
}

impl GoogleCalendarSource {
    /// # Errors
    /// Returns `FlufferError::Config` when `api_base_url` is not a valid URL.
    pub fn new(config: &CalendarConfig, http: HttpClient) -> Result<Self> {
        Url::parse(&config.api_base_url).map_err(|e| {
            FlufferError::Config(format!("Invalid calendar api_base_url: {e}"))
        })?;
        Ok(Self {
            auth: GoogleTokenProvider::new(config, http.clone()),
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            cache: None,
        })
    }

    /// Mirror fetched events into `cache`.
    pub fn with_cache(mut self, cache: Arc<dyn KeyValueStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn events_url(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, urlencoding::encode(&self.calendar_id))
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }

    /// Send with a bearer token, refreshing it once if the API rejects it.
    async fn send_authorized<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.auth.access_token().await?;
        match self.http.send_json(build(&token)).await {
            Err(FlufferError::Auth(reason)) => {
                warn!(reason = %reason, "Calendar rejected access token, refreshing");
                self.auth.invalidate().await;
                let token = self.auth.access_token().await?;
                self.http.send_json(build(&token)).await
            }
            other => other,
        }
    }

    async fn fetch_page(
        &self,
        checkpoint: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<EventsPage> {
        let url = self.events_url();
        let mut query: Vec<(&str, &str)> = vec![("singleEvents", "true")];
        if let Some(sync_token) = checkpoint {
            query.push(("syncToken", sync_token));
        }
        if let Some(page) = page_token {
            query.push(("pageToken", page));
        }

        self.send_authorized(|token| {
            self.http.request(Method::GET, &url).bearer_auth(token).query(&query)
        })
        .await
    }

    async fn cache_event(&self, event: &CalendarEvent) {
        let Some(cache) = &self.cache else { return };
        let key = format!("{EVENT_CACHE_KEY_PREFIX}{}", event.id);
        let outcome = if event.is_cancelled() {
            cache.delete(&key).await
        } else {
            match serde_json::to_value(event) {
                Ok(value) => cache.set(&key, value).await,
                Err(e) => Err(FlufferError::Internal(format!("json: {e}"))),
            }
        };
        if let Err(e) = outcome {
            warn!(event_id = %event.id, error = %e, "Failed to update event cache");
        }
    }

    async fn cached_event(&self, event_id: &str) -> Option<CalendarEvent> {
        let cache = self.cache.as_ref()?;
        let key = format!("{EVENT_CACHE_KEY_PREFIX}{event_id}");
        match cache.get(&key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(event_id, error = %e, "Discarding unreadable cached event");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(event_id, error = %e, "Event cache lookup failed");
                None
            }
        }
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarSource {
    #[instrument(skip(self), fields(full_sync = checkpoint.is_none()))]
    async fn poll_changes(&self, checkpoint: Option<&str>) -> Result<ChangeBatch> {
        let mut events = Vec::new();
        let mut next_checkpoint = None;
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(checkpoint, page_token.as_deref()).await?;
            pages += 1;

            for event in &page.items {
                self.cache_event(event).await;
            }
            events.extend(page.items);

            if page.next_sync_token.is_some() {
                next_checkpoint = page.next_sync_token;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if next_checkpoint.is_none() {
            warn!(pages, "Calendar did not hand out a sync token");
        }
        debug!(pages, events = events.len(), "Polled calendar changes");
        Ok(ChangeBatch { events, next_checkpoint })
    }

    #[instrument(skip(self))]
    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>> {
        if let Some(event) = self.cached_event(event_id).await {
            return Ok(Some(event));
        }

        let url = self.event_url(event_id);
        let fetched: Result<CalendarEvent> = self
            .send_authorized(|token| self.http.request(Method::GET, &url).bearer_auth(token))
            .await;

        match fetched {
            Ok(event) => {
                self.cache_event(&event).await;
                Ok((!event.is_cancelled()).then_some(event))
            }
            // Deleted events answer 410 on point lookups.
            Err(FlufferError::NotFound(_)) | Err(FlufferError::StaleCheckpoint(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, attendees), fields(attendees = attendees.len()))]
    async fn write_attendees(
        &self,
        event_id: &str,
        attendees: &[Attendee],
    ) -> Result<CalendarEvent> {
        let url = self.event_url(event_id);
        let body = AttendeePatch { attendees };

        let redacted: Vec<String> = attendees.iter().map(|a| redact_email(&a.email)).collect();
        debug!(?redacted, "Patching attendee list");

        let updated: CalendarEvent = self
            .send_authorized(|token| {
                self.http
                    .request(Method::PATCH, &url)
                    .bearer_auth(token)
                    .query(&[("sendUpdates", "all")])
                    .json(&body)
            })
            .await?;

        info!(event_id, attendees = updated.attendees.len(), "Wrote attendees to calendar");
        self.cache_event(&updated).await;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use fluffer_domain::ResponseStatus;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::database::{DbManager, SqliteKeyValueStore};

    const EVENTS_PATH: &str = "/calendars/club%40group.calendar.google.com/events";

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "ya29.test", "expires_in": 3600})),
            )
            .mount(server)
            .await;
    }

    fn source(server: &MockServer) -> GoogleCalendarSource {
        let config = CalendarConfig {
            calendar_id: "club@group.calendar.google.com".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            refresh_token: "refresh".into(),
            api_base_url: server.uri(),
            token_url: format!("{}/token", server.uri()),
        };
        let http = HttpClient::builder().max_attempts(1).build().expect("http client");
        GoogleCalendarSource::new(&config, http).expect("source")
    }

    fn sqlite_cache() -> (TempDir, Arc<dyn KeyValueStore>) {
        let dir = TempDir::new().expect("temp dir");
        let db = DbManager::new(dir.path().join("cache.db"), 1).expect("db");
        db.run_migrations().expect("migrations");
        (dir, Arc::new(SqliteKeyValueStore::new(Arc::new(db))))
    }

    fn event_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "status": "confirmed",
            "summary": format!("Event {id}"),
            "start": {"dateTime": "2030-03-01T19:00:00Z"},
            "end": {"dateTime": "2030-03-01T21:00:00Z"},
            "attendees": [{"email": "a@example.com", "responseStatus": "accepted"}]
        })
    }

    #[tokio::test]
    async fn full_poll_follows_pages_and_returns_sync_token() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [event_json("b")],
                "nextSyncToken": "sync-1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("singleEvents", "true"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [event_json("a")],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = source(&server).poll_changes(None).await.expect("poll");
        let ids: Vec<&str> = batch.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(batch.next_checkpoint.as_deref(), Some("sync-1"));

        let requests = server.received_requests().await.unwrap_or_default();
        let listed: Vec<_> = requests.iter().filter(|r| r.method.as_str() == "GET").collect();
        assert!(listed.iter().all(|r| !r.url.query().unwrap_or("").contains("syncToken")));
    }

    #[tokio::test]
    async fn incremental_poll_sends_sync_token() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("syncToken", "sync-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "a", "status": "cancelled"}],
                "nextSyncToken": "sync-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = source(&server).poll_changes(Some("sync-1")).await.expect("poll");
        assert!(batch.events[0].is_cancelled());
        assert_eq!(batch.next_checkpoint.as_deref(), Some("sync-2"));
    }

    #[tokio::test]
    async fn gone_sync_token_is_stale_checkpoint() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(410).set_body_string("fullSyncRequired"))
            .mount(&server)
            .await;

        let result = source(&server).poll_changes(Some("expired")).await;
        assert!(matches!(result, Err(FlufferError::StaleCheckpoint(_))));
    }

    #[tokio::test]
    async fn rejected_token_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "ya29.test", "expires_in": 3600})),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": [], "nextSyncToken": "sync-1"})),
            )
            .mount(&server)
            .await;

        let batch = source(&server).poll_changes(None).await.expect("poll after refresh");
        assert_eq!(batch.next_checkpoint.as_deref(), Some("sync-1"));
    }

    #[tokio::test]
    async fn write_attendees_patches_and_notifies() {
        let server = MockServer::start().await;
        mount_token(&server).await;

        let attendees = vec![
            Attendee::new("a@example.com", ResponseStatus::Accepted),
            Attendee::new("b@example.com", ResponseStatus::NeedsAction),
        ];
        let mut updated = event_json("evt-1");
        updated["attendees"] = serde_json::to_value(&attendees).unwrap();

        Mock::given(method("PATCH"))
            .and(path(format!("{EVENTS_PATH}/evt-1")))
            .and(query_param("sendUpdates", "all"))
            .and(body_json(json!({
                "attendees": [
                    {"email": "a@example.com", "responseStatus": "accepted"},
                    {"email": "b@example.com", "responseStatus": "needsAction"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(updated))
            .expect(1)
            .mount(&server)
            .await;

        let event = source(&server).write_attendees("evt-1", &attendees).await.expect("patch");
        assert_eq!(event.attendees, attendees);
    }

    #[tokio::test]
    async fn get_event_missing_is_none() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("{EVENTS_PATH}/nope")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert_eq!(source(&server).get_event("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn polled_events_populate_cache_and_cancellations_evict() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        let (_dir, cache) = sqlite_cache();
        let calendar = source(&server).with_cache(Arc::clone(&cache));

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .and(query_param("syncToken", "sync-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "a", "status": "cancelled"}],
                "nextSyncToken": "sync-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [event_json("a")],
                "nextSyncToken": "sync-1"
            })))
            .mount(&server)
            .await;

        calendar.poll_changes(None).await.expect("full poll");
        assert!(cache.get("event/a").await.unwrap().is_some());

        // Served from the cache: no point-lookup mock is mounted.
        let cached = calendar.get_event("a").await.unwrap().expect("cached event");
        assert_eq!(cached.summary.as_deref(), Some("Event a"));

        calendar.poll_changes(Some("sync-1")).await.expect("incremental poll");
        assert!(cache.get("event/a").await.unwrap().is_none());
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let config = CalendarConfig { api_base_url: "not a url".into(), ..Default::default() };
        let http = HttpClient::new().expect("http client");
        assert!(matches!(
            GoogleCalendarSource::new(&config, http),
            Err(FlufferError::Config(_))
        ));
    }
}
