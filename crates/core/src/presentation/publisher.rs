//! Applies rendered payloads to the chat surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fluffer_domain::constants::RESPONSE_REACTIONS;
use fluffer_domain::{BotSettings, ChannelId, FlufferError, Result, RsvpRecord};
use tracing::{debug, info, instrument, warn};

use super::render::{render_message, render_scheduled_event};
use crate::rsvp::ports::NotificationSurface;

/// Creates, edits and tears down announcement artifacts for records.
pub struct Publisher {
    surface: Arc<dyn NotificationSurface>,
    default_channel: String,
    tz: Tz,
}

impl Publisher {
    pub fn new(surface: Arc<dyn NotificationSurface>, default_channel: String, tz: Tz) -> Self {
        Self { surface, default_channel, tz }
    }

    /// Channel a record is announced in: the invite group's routed channel,
    /// else the default one.
    pub async fn channel_for(
        &self,
        record: &RsvpRecord,
        settings: &BotSettings,
    ) -> Result<ChannelId> {
        let name = settings.channel_for(record.invite.as_deref(), &self.default_channel);
        if let Some(id) = self.surface.resolve_channel(name).await? {
            return Ok(id);
        }

        warn!(event_id = %record.event_id, channel = %name, "Unknown channel, using default");
        self.surface.resolve_channel(&self.default_channel).await?.ok_or_else(|| {
            FlufferError::NotFound(format!("default channel {}", self.default_channel))
        })
    }

    /// Bring the record's artifacts in line with its state.
    ///
    /// Hidden, cancelled and materially changed records lose their message;
    /// hidden and cancelled ones also lose their scheduled event and stop
    /// there. Everything else gets its message edited or created, reactions
    /// attached and pinned, and a scheduled event until it starts.
    #[instrument(skip(self, record, settings), fields(event_id = %record.event_id))]
    pub async fn publish(
        &self,
        record: &mut RsvpRecord,
        settings: &BotSettings,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let channel = self.channel_for(record, settings).await?;

        if record.hide || record.cancelled || record.significant_change {
            self.take_down_message(&channel, record).await;
        }

        if record.hide || record.cancelled {
            if let Some(id) = record.scheduled_event_id.take() {
                if let Err(e) = self.surface.delete_scheduled_event(&id).await {
                    warn!(scheduled_event_id = %id, error = %e, "Failed to delete scheduled event");
                }
            }
            return Ok(());
        }

        self.announce(&channel, record, now).await
    }

    /// Delete and recreate the announcement unconditionally.
    #[instrument(skip(self, record, settings), fields(event_id = %record.event_id))]
    pub async fn resend(
        &self,
        record: &mut RsvpRecord,
        settings: &BotSettings,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let channel = self.channel_for(record, settings).await?;
        self.take_down_message(&channel, record).await;
        if record.hide || record.cancelled {
            return Ok(());
        }
        self.announce(&channel, record, now).await
    }

    async fn announce(
        &self,
        channel: &str,
        record: &mut RsvpRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let payload = render_message(record, self.tz);
        let message_id = match record.message_id.clone() {
            Some(id) => match self.surface.edit_message(channel, &id, &payload).await {
                Ok(()) => {
                    debug!(message_id = %id, "Updated message");
                    id
                }
                Err(FlufferError::NotFound(_)) => {
                    warn!(message_id = %id, "Message missing, sending a new one");
                    record.message_id = None;
                    self.surface.create_message(channel, &payload).await?
                }
                Err(e) => return Err(e),
            },
            None => {
                let id = self.surface.create_message(channel, &payload).await?;
                info!(message_id = %id, "Sent message");
                id
            }
        };
        record.message_id = Some(message_id.clone());
        record.significant_change = false;

        for emoji in RESPONSE_REACTIONS {
            self.surface.add_reaction(channel, &message_id, emoji).await?;
        }
        self.surface.pin_message(channel, &message_id).await?;

        if self.surface.supports_scheduled_events() && record.start > now {
            self.sync_scheduled_event(record).await?;
        }
        Ok(())
    }

    async fn sync_scheduled_event(&self, record: &mut RsvpRecord) -> Result<()> {
        let payload = render_scheduled_event(record);
        if let Some(id) = record.scheduled_event_id.clone() {
            match self.surface.edit_scheduled_event(&id, &payload).await {
                Ok(()) => return Ok(()),
                Err(FlufferError::NotFound(_)) => {
                    warn!(scheduled_event_id = %id, "Scheduled event missing, recreating");
                    record.scheduled_event_id = None;
                }
                Err(e) => return Err(e),
            }
        }
        let id = self.surface.create_scheduled_event(&payload).await?;
        record.scheduled_event_id = Some(id);
        Ok(())
    }

    /// Unpin and delete the current message. Failures are logged; the handle
    /// is forgotten either way.
    async fn take_down_message(&self, channel: &str, record: &mut RsvpRecord) {
        let Some(id) = record.message_id.take() else {
            return;
        };
        info!(event_id = %record.event_id, message_id = %id, "Deleting message");
        if let Err(e) = self.surface.unpin_message(channel, &id).await {
            debug!(message_id = %id, error = %e, "Unpin failed");
        }
        if let Err(e) = self.surface.delete_message(channel, &id).await {
            warn!(message_id = %id, error = %e, "Failed to delete message");
        }
    }
}
