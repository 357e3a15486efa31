//! Port interfaces for the reconciliation engine
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use async_trait::async_trait;
use fluffer_domain::{
    Attendee, CalendarEvent, ChangeBatch, ChannelId, GroupInfo, MessageId, MessagePayload,
    ReactionSet, Result, ScheduledEventPayload, UserId,
};
use serde_json::Value;

/// Source of scheduling truth
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Fetch every event changed since `checkpoint`, following pagination
    /// internally. `None` requests a full enumeration.
    ///
    /// Returns `FlufferError::StaleCheckpoint` when the checkpoint was
    /// rejected and a full resync is needed.
    async fn poll_changes(&self, checkpoint: Option<&str>) -> Result<ChangeBatch>;

    /// Point lookup; `None` when the event is unknown.
    async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>>;

    /// Replace the attendee list of an event and return the updated event.
    async fn write_attendees(&self, event_id: &str, attendees: &[Attendee])
        -> Result<CalendarEvent>;
}

/// Chat platform the announcements live on
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Resolve a lower-cased group name; `None` when no such group exists.
    async fn resolve_group(&self, name: &str) -> Result<Option<GroupInfo>>;

    async fn resolve_display_name(&self, user: &str) -> Result<String>;

    /// Resolve a lower-cased channel name to its id.
    async fn resolve_channel(&self, name: &str) -> Result<Option<ChannelId>>;

    /// Identity the bot itself posts and reacts as.
    async fn current_user_id(&self) -> Result<UserId>;

    async fn create_message(&self, channel: &str, payload: &MessagePayload) -> Result<MessageId>;

    /// Returns `FlufferError::NotFound` when the message no longer exists.
    async fn edit_message(
        &self,
        channel: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> Result<()>;

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<()>;

    async fn pin_message(&self, channel: &str, message_id: &str) -> Result<()>;

    async fn unpin_message(&self, channel: &str, message_id: &str) -> Result<()>;

    async fn add_reaction(&self, channel: &str, message_id: &str, emoji: &str) -> Result<()>;

    async fn enumerate_reactions(&self, channel: &str, message_id: &str)
        -> Result<Vec<ReactionSet>>;

    async fn remove_user_reaction(
        &self,
        channel: &str,
        message_id: &str,
        emoji: &str,
        user: &str,
    ) -> Result<()>;

    /// Whether companion scheduled events are available on this surface.
    fn supports_scheduled_events(&self) -> bool;

    async fn create_scheduled_event(&self, payload: &ScheduledEventPayload) -> Result<String>;

    /// Returns `FlufferError::NotFound` when the scheduled event is gone.
    async fn edit_scheduled_event(&self, id: &str, payload: &ScheduledEventPayload)
        -> Result<()>;

    async fn delete_scheduled_event(&self, id: &str) -> Result<()>;
}

/// Durable key to JSON value mapping
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Value)>>;
}
