//! Reconciliation engine - drives every record through the per-tick pipeline
//! and applies user-originated changes.
//!
//! Per record the pipeline is strictly ordered:
//! 1. merge calendar-origin changes when the calendar reported the event
//! 2. compute invites unless the record is past, hidden or cancelled
//! 3. merge again when invites changed or local changes are pending
//! 4. refresh visibility
//! 5. publish when anything visible changed, or on the first run
//! 6. persist, or delete past and cancelled records after cleanup
//!
//! Step 6 runs even when an earlier step failed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use fluffer_domain::constants::{NO_EMOJI, NO_RESPONSE_EMOJI, YES_EMOJI, ZOOM_EMOJI};
use fluffer_domain::{
    BotSettings, CalendarEvent, Config, FlufferError, Response, Result, RsvpRecord, UserId,
};
use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, instrument, warn};

use super::ingest::{self, IngestOptions};
use super::invites;
use super::merge::{self, EmailDirectory};
use super::ports::{CalendarSource, KeyValueStore, NotificationSurface};
use super::store::RsvpStore;
use super::visibility;
use crate::presentation::Publisher;

/// Engine tuning, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tz: Tz,
    pub future_limit: Duration,
    pub materiality: Duration,
    pub sweep_concurrency: usize,
    pub synthetic_email_domain: String,
    pub default_channel: String,
}

impl EngineSettings {
    /// # Errors
    /// Returns `FlufferError::Config` for an unknown display timezone.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            tz: config.display.tz()?,
            future_limit: Duration::days(config.sync.future_limit_days),
            materiality: Duration::hours(config.sync.materiality_threshold_hours),
            sweep_concurrency: config.sync.sweep_concurrency.max(1),
            synthetic_email_domain: config.display.synthetic_email_domain.clone(),
            default_channel: config.discord.default_channel.clone(),
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            tz: chrono_tz::UTC,
            future_limit: Duration::days(config.sync.future_limit_days),
            materiality: Duration::hours(config.sync.materiality_threshold_hours),
            sweep_concurrency: config.sync.sweep_concurrency,
            synthetic_email_domain: config.display.synthetic_email_domain,
            default_channel: config.discord.default_channel,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Another tick held the guard; nothing ran.
    pub skipped: bool,
    pub events_polled: usize,
    pub records_swept: usize,
    pub failures: usize,
}

/// Per-tick flags shared by every record in a sweep.
#[derive(Debug, Clone, Copy)]
struct Sweep {
    now: DateTime<Utc>,
    first_run: bool,
    catch_up: bool,
}

pub struct RsvpEngine {
    calendar: Arc<dyn CalendarSource>,
    surface: Arc<dyn NotificationSurface>,
    store: RsvpStore,
    publisher: Publisher,
    options: EngineSettings,
    settings: RwLock<BotSettings>,
    record_locks: DashMap<String, Arc<Mutex<()>>>,
    tick_guard: Mutex<()>,
    first_run: AtomicBool,
    /// Set until a sweep has re-read reactions on every announcement.
    reaction_catch_up: AtomicBool,
}

impl RsvpEngine {
    pub fn new(
        calendar: Arc<dyn CalendarSource>,
        surface: Arc<dyn NotificationSurface>,
        kv: Arc<dyn KeyValueStore>,
        options: EngineSettings,
    ) -> Self {
        let publisher =
            Publisher::new(Arc::clone(&surface), options.default_channel.clone(), options.tz);
        Self {
            calendar,
            surface,
            store: RsvpStore::new(kv),
            publisher,
            options,
            settings: RwLock::new(BotSettings::default()),
            record_locks: DashMap::new(),
            tick_guard: Mutex::new(()),
            first_run: AtomicBool::new(true),
            reaction_catch_up: AtomicBool::new(true),
        }
    }

    /// Load persisted settings. Call once before the first tick.
    pub async fn load_settings(&self) -> Result<()> {
        let loaded = self.store.load_settings().await?;
        info!(
            accounts = loaded.accounts.len(),
            routes = loaded.channels.len(),
            "Loaded settings"
        );
        *self.settings.write().await = loaded;
        Ok(())
    }

    /// Re-read reactions on every announcement during the next sweep.
    ///
    /// Reactions added while no listener was connected are otherwise lost.
    pub fn request_reaction_catch_up(&self) {
        self.reaction_catch_up.store(true, Ordering::SeqCst);
    }

    pub fn store(&self) -> &RsvpStore {
        &self.store
    }

    pub async fn settings(&self) -> BotSettings {
        self.settings.read().await.clone()
    }

    /// Link or unlink a user's calendar address. Returns the previous one.
    pub async fn set_account(&self, user: &str, email: Option<String>) -> Result<Option<String>> {
        let mut settings = self.settings.write().await;
        let previous = match email {
            Some(email) => settings.accounts.insert(user.to_string(), email),
            None => settings.accounts.remove(user),
        };
        self.store.save_settings(&settings).await?;
        Ok(previous)
    }

    /// Route announcements for `role` to `channel`.
    pub async fn set_channel(&self, role: &str, channel: &str) -> Result<()> {
        let mut settings = self.settings.write().await;
        settings.channels.insert(role.to_string(), channel.to_string());
        self.store.save_settings(&settings).await
    }

    pub async fn record(&self, event_id: &str) -> Result<Option<RsvpRecord>> {
        self.store.load(event_id).await
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    pub async fn run_tick(&self) -> Result<TickSummary> {
        self.run_tick_at(Utc::now()).await
    }

    /// Run the delta pass and then the sweep pass as of `now`.
    ///
    /// A tick that finds another one in flight returns immediately with
    /// `skipped` set.
    #[instrument(skip(self))]
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            debug!("Tick already in flight, skipping");
            return Ok(TickSummary { skipped: true, ..TickSummary::default() });
        };

        let first_run = self.first_run.load(Ordering::SeqCst);
        let catch_up = self.reaction_catch_up.swap(false, Ordering::SeqCst);
        let mut summary = TickSummary::default();

        let processed = match self.delta_pass(now, first_run, &mut summary).await {
            Ok(processed) => processed,
            Err(e) => {
                warn!(error = %e, "Calendar delta pass failed");
                summary.failures += 1;
                HashSet::new()
            }
        };

        let sweep = Sweep { now, first_run, catch_up };
        self.sweep_pass(sweep, &processed, &mut summary).await?;

        self.first_run.store(false, Ordering::SeqCst);
        info!(
            polled = summary.events_polled,
            swept = summary.records_swept,
            failures = summary.failures,
            "Tick complete"
        );
        Ok(summary)
    }

    async fn delta_pass(
        &self,
        now: DateTime<Utc>,
        first_run: bool,
        summary: &mut TickSummary,
    ) -> Result<HashSet<String>> {
        let checkpoint = self.store.checkpoint().await?;
        let batch = match self.calendar.poll_changes(checkpoint.as_deref()).await {
            Ok(batch) => batch,
            Err(FlufferError::StaleCheckpoint(reason)) => {
                warn!(%reason, "Sync checkpoint rejected, running full resync");
                self.store.clear_checkpoint().await?;
                self.calendar.poll_changes(None).await?
            }
            Err(e) => return Err(e),
        };

        summary.events_polled = batch.events.len();
        let mut processed = HashSet::new();
        for event in &batch.events {
            if let Err(e) = self.process_event(event, now, first_run).await {
                error!(event_id = %event.id, error = %e, "Failed to process calendar event");
                summary.failures += 1;
            }
            processed.insert(event.id.clone());
        }

        if let Some(next) = batch.next_checkpoint {
            self.store.set_checkpoint(&next).await?;
        }
        Ok(processed)
    }

    async fn sweep_pass(
        &self,
        sweep: Sweep,
        processed: &HashSet<String>,
        summary: &mut TickSummary,
    ) -> Result<()> {
        let ids: Vec<String> = self
            .store
            .all()
            .await?
            .into_iter()
            .map(|record| record.event_id)
            .filter(|id| !processed.contains(id))
            .collect();

        let swept = AtomicUsize::new(0);
        let failures = AtomicUsize::new(0);
        stream::iter(ids)
            .for_each_concurrent(self.options.sweep_concurrency, |event_id| {
                let swept = &swept;
                let failures = &failures;
                async move {
                    swept.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = self.sweep_record(&event_id, sweep).await {
                        error!(event_id = %event_id, error = %e, "Failed to sweep record");
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .await;

        summary.records_swept = swept.into_inner();
        summary.failures += failures.into_inner();
        Ok(())
    }

    async fn process_event(
        &self,
        event: &CalendarEvent,
        now: DateTime<Utc>,
        first_run: bool,
    ) -> Result<()> {
        let lock = self.record_lock(&event.id);
        let _guard = lock.lock().await;

        let previous = self.store.load(&event.id).await?;
        let Some(mut record) = ingest::apply_event(previous.clone(), event, &self.ingest_options())
        else {
            debug!(event_id = %event.id, "Nothing to track for event");
            return Ok(());
        };

        self.run_pipeline(&mut record, Some(event), previous.as_ref(), now, first_run).await
    }

    async fn sweep_record(&self, event_id: &str, sweep: Sweep) -> Result<()> {
        let Some((_guard, mut record)) = self.checkout(event_id).await? else {
            return Ok(());
        };
        let previous = record.clone();

        if sweep.catch_up {
            self.catch_up_reactions(&mut record).await;
        }

        self.run_pipeline(&mut record, None, Some(&previous), sweep.now, sweep.first_run).await
    }

    async fn run_pipeline(
        &self,
        record: &mut RsvpRecord,
        event: Option<&CalendarEvent>,
        previous: Option<&RsvpRecord>,
        now: DateTime<Utc>,
        first_run: bool,
    ) -> Result<()> {
        if let Err(e) = self.reconcile(record, event, previous, now, first_run).await {
            warn!(event_id = %record.event_id, error = %e, "Reconciliation step failed");
            if first_run || presentation_changed(previous, record) {
                record.needs_publish = true;
            }
        }
        self.finish(record, now).await
    }

    async fn reconcile(
        &self,
        record: &mut RsvpRecord,
        event: Option<&CalendarEvent>,
        previous: Option<&RsvpRecord>,
        now: DateTime<Utc>,
        first_run: bool,
    ) -> Result<()> {
        // New records need to know whether they start out hidden.
        visibility::refresh(record, now, self.options.future_limit);

        if !record.cancelled {
            ingest::resolve_color(record, self.surface.as_ref()).await;

            let mut current = event.cloned();
            let merged = current.is_some();
            if merged {
                self.merge(record, &mut current).await?;
            }

            let mut invites_changed = false;
            if !record.past && !record.hide {
                invites_changed = invites::refresh_invites(record, self.surface.as_ref()).await?;
            }

            if invites_changed || (!merged && !record.changed.is_empty()) {
                self.merge(record, &mut current).await?;
            }

            visibility::refresh(record, now, self.options.future_limit);
        }

        if first_run || presentation_changed(previous, record) || needs_publish(record) {
            self.publish(record, now).await?;
        }
        Ok(())
    }

    /// Merge attendance against `current`, fetching the event when needed.
    ///
    /// A failed attendee write restores the cleared `changed` markers so the
    /// local change is retried instead of being overwritten next tick.
    async fn merge(&self, record: &mut RsvpRecord, current: &mut Option<CalendarEvent>) -> Result<()> {
        if current.is_none() {
            *current = self.calendar.get_event(&record.event_id).await?;
        }
        let Some(event) = current.as_ref() else {
            debug!(event_id = %record.event_id, "Event not found on calendar; skipping merge");
            return Ok(());
        };

        let directory = self.email_directory(record).await;
        let outcome = merge::merge_attendance(record, &event.attendees, &directory);
        if outcome.external > 0 {
            info!(event_id = %record.event_id, count = outcome.external, "Applied calendar responses");
        }
        if !outcome.dirty {
            return Ok(());
        }

        match self.calendar.write_attendees(&record.event_id, &outcome.attendees).await {
            Ok(updated) => {
                info!(
                    event_id = %record.event_id,
                    attendees = outcome.attendees.len(),
                    "Wrote attendees to calendar"
                );
                *current = Some(updated);
            }
            Err(e) => {
                warn!(event_id = %record.event_id, error = %e, "Attendee write failed; will retry");
                record.changed.extend(outcome.reconciled);
            }
        }
        Ok(())
    }

    async fn email_directory(&self, record: &RsvpRecord) -> EmailDirectory {
        let accounts = self.settings.read().await.accounts.clone();
        let mut directory = EmailDirectory::default();
        for (user, email) in &accounts {
            directory.insert(user.clone(), email.clone());
        }

        let unmapped: HashSet<&UserId> = record
            .invited
            .iter()
            .chain(record.changed.iter())
            .filter(|user| !accounts.contains_key(*user))
            .collect();
        for user in unmapped {
            let name = match self.surface.resolve_display_name(user).await {
                Ok(name) => name,
                Err(e) => {
                    debug!(user = %user, error = %e, "Display name lookup failed");
                    user.clone()
                }
            };
            directory.insert(
                user.clone(),
                merge::synthetic_email(&name, user, &self.options.synthetic_email_domain),
            );
        }
        directory
    }

    /// Persist the record, or remove it once it is past or cancelled.
    async fn finish(&self, record: &mut RsvpRecord, now: DateTime<Utc>) -> Result<()> {
        if !(record.cancelled || record.past) {
            return self.store.save(record).await;
        }

        if record.message_id.is_some() || record.scheduled_event_id.is_some() {
            let settings = self.settings.read().await.clone();
            if let Err(e) = self.publisher.publish(record, &settings, now).await {
                warn!(event_id = %record.event_id, error = %e, "Cleanup failed; removing record anyway");
            }
        }
        self.store.delete(&record.event_id).await?;
        self.record_locks.remove(&record.event_id);
        info!(
            event_id = %record.event_id,
            cancelled = record.cancelled,
            past = record.past,
            "Removed record"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Inbound chat events
    // ------------------------------------------------------------------------

    /// Apply a reaction on an announcement and remove it again.
    ///
    /// Returns whether the record changed. Reactions on unknown messages and
    /// the bot's own reactions are ignored.
    #[instrument(skip(self))]
    pub async fn handle_reaction(&self, message_id: &str, emoji: &str, user: &str) -> Result<bool> {
        if user == self.surface.current_user_id().await? {
            return Ok(false);
        }
        let Some(found) = self.store.find_by_message(message_id).await? else {
            return Ok(false);
        };

        let Some((_guard, mut record)) = self.checkout(&found.event_id).await? else {
            return Ok(false);
        };
        let previous = record.clone();

        let changed = apply_reaction(&mut record, emoji, user);

        let settings = self.settings.read().await.clone();
        match self.publisher.channel_for(&record, &settings).await {
            Ok(channel) => {
                if let Err(e) =
                    self.surface.remove_user_reaction(&channel, message_id, emoji, user).await
                {
                    warn!(error = %e, "Failed to remove reaction");
                }
            }
            Err(e) => warn!(error = %e, "No channel to remove reaction from"),
        }

        if changed {
            self.commit_local_change(&mut record, &previous, Utc::now()).await?;
        }
        Ok(changed)
    }

    /// Track a subscription change on a companion scheduled event.
    #[instrument(skip(self))]
    pub async fn handle_interest(
        &self,
        scheduled_event_id: &str,
        user: &str,
        interested: bool,
    ) -> Result<bool> {
        let Some(found) = self.store.find_by_scheduled_event(scheduled_event_id).await? else {
            return Ok(false);
        };

        let Some((_guard, mut record)) = self.checkout(&found.event_id).await? else {
            return Ok(false);
        };
        let previous = record.clone();

        let changed = record.set_interest(user, interested);
        if changed {
            self.commit_local_change(&mut record, &previous, Utc::now()).await?;
        }
        Ok(changed)
    }

    /// Record a response given by command. `None` when the event is unknown.
    pub async fn change_response(
        &self,
        event_id: &str,
        user: &str,
        response: Response,
    ) -> Result<Option<RsvpRecord>> {
        let Some((_guard, mut record)) = self.checkout(event_id).await? else {
            return Ok(None);
        };
        let previous = record.clone();

        if record.change_response(user, response) {
            self.commit_local_change(&mut record, &previous, Utc::now()).await?;
        }
        Ok(Some(record))
    }

    /// Override the record's color.
    pub async fn recolor(&self, event_id: &str, color: u32) -> Result<Option<RsvpRecord>> {
        let Some((_guard, mut record)) = self.checkout(event_id).await? else {
            return Ok(None);
        };
        let previous = record.clone();

        record.color = Some(color);
        self.commit_local_change(&mut record, &previous, Utc::now()).await?;
        Ok(Some(record))
    }

    /// Delete and recreate the announcement.
    pub async fn resend(&self, event_id: &str) -> Result<Option<RsvpRecord>> {
        let Some((_guard, mut record)) = self.checkout(event_id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        visibility::refresh(&mut record, now, self.options.future_limit);
        let settings = self.settings.read().await.clone();
        let published = self.publisher.resend(&mut record, &settings, now).await;
        record.needs_publish = published.is_err();
        self.store.save(&record).await?;
        published?;
        Ok(Some(record))
    }

    /// Cancel the event locally: tear down its artifacts and forget it.
    pub async fn cancel(&self, event_id: &str) -> Result<Option<RsvpRecord>> {
        let Some((_guard, mut record)) = self.checkout(event_id).await? else {
            return Ok(None);
        };

        record.cancelled = true;
        self.finish(&mut record, Utc::now()).await?;
        Ok(Some(record))
    }

    /// Compute invites now, even for an event that is still hidden.
    pub async fn send_invites(&self, event_id: &str) -> Result<Option<RsvpRecord>> {
        let Some((_guard, mut record)) = self.checkout(event_id).await? else {
            return Ok(None);
        };
        let previous = record.clone();

        invites::refresh_invites(&mut record, self.surface.as_ref()).await?;
        self.commit_local_change(&mut record, &previous, Utc::now()).await?;
        Ok(Some(record))
    }

    /// Refresh visibility, publish if anything visible changed, then save.
    async fn commit_local_change(
        &self,
        record: &mut RsvpRecord,
        previous: &RsvpRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        visibility::refresh(record, now, self.options.future_limit);
        if presentation_changed(Some(previous), record) || needs_publish(record) {
            if let Err(e) = self.publish(record, now).await {
                warn!(event_id = %record.event_id, error = %e, "Failed to update announcement");
            }
        }
        self.store.save(record).await
    }

    /// Publish the record, leaving `needs_publish` set unless it succeeds.
    async fn publish(&self, record: &mut RsvpRecord, now: DateTime<Utc>) -> Result<()> {
        record.needs_publish = true;
        let settings = self.settings.read().await.clone();
        self.publisher.publish(record, &settings, now).await?;
        record.needs_publish = false;
        Ok(())
    }

    /// Take the record's lock and load it.
    async fn checkout(&self, event_id: &str) -> Result<Option<(OwnedMutexGuard<()>, RsvpRecord)>> {
        let guard = self.record_lock(event_id).lock_owned().await;
        Ok(self.store.load(event_id).await?.map(|record| (guard, record)))
    }

    async fn catch_up_reactions(&self, record: &mut RsvpRecord) {
        match self.try_catch_up_reactions(record).await {
            Ok(0) => {}
            Ok(applied) => info!(event_id = %record.event_id, applied, "Caught up on reactions"),
            Err(e) => warn!(event_id = %record.event_id, error = %e, "Reaction catch-up failed"),
        }
    }

    async fn try_catch_up_reactions(&self, record: &mut RsvpRecord) -> Result<usize> {
        let Some(message_id) = record.message_id.clone() else {
            return Ok(0);
        };
        let settings = self.settings.read().await.clone();
        let channel = self.publisher.channel_for(record, &settings).await?;
        let bot = self.surface.current_user_id().await?;

        let mut applied = 0;
        for set in self.surface.enumerate_reactions(&channel, &message_id).await? {
            for user in set.users.iter().filter(|user| **user != bot) {
                debug!(emoji = %set.emoji, user = %user, "Handling missed reaction");
                if apply_reaction(record, &set.emoji, user) {
                    applied += 1;
                }
                if let Err(e) =
                    self.surface.remove_user_reaction(&channel, &message_id, &set.emoji, user).await
                {
                    warn!(error = %e, "Failed to remove reaction");
                }
            }
        }
        Ok(applied)
    }

    fn record_lock(&self, event_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.record_locks.entry(event_id.to_string()).or_default().value())
    }

    fn ingest_options(&self) -> IngestOptions {
        IngestOptions { tz: self.options.tz, materiality: self.options.materiality }
    }
}

/// Map a reaction emoji to a response and apply it.
fn apply_reaction(record: &mut RsvpRecord, emoji: &str, user: &str) -> bool {
    let response = match emoji {
        YES_EMOJI => Response::Yes,
        NO_EMOJI => Response::No,
        NO_RESPONSE_EMOJI => Response::Undecided,
        ZOOM_EMOJI => Response::Zoom,
        other => {
            debug!(emoji = %other, "Ignoring unknown reaction");
            return false;
        }
    };
    info!(event_id = %record.event_id, user = %user, ?response, "Reaction response");
    record.change_response(user, response)
}

/// Whether the rendered announcement would differ from `previous`.
fn presentation_changed(previous: Option<&RsvpRecord>, current: &RsvpRecord) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    previous.title != current.title
        || previous.location != current.location
        || previous.description != current.description
        || previous.image != current.image
        || previous.color != current.color
        || previous.start != current.start
        || previous.end != current.end
        || previous.invited != current.invited
        || previous.yes != current.yes
        || previous.no != current.no
        || previous.zoom != current.zoom
        || previous.cancelled != current.cancelled
        || previous.hide != current.hide
        || previous.past != current.past
        || previous.from_now != current.from_now
        || previous.significant_change != current.significant_change
}

/// A pending publish, or a visible record without a message.
fn needs_publish(record: &RsvpRecord) -> bool {
    record.needs_publish || (!record.hide && !record.cancelled && record.message_id.is_none())
}
