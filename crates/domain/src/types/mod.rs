//! Domain types and models

pub mod calendar;
pub mod notification;
pub mod rsvp;
pub mod settings;

pub use calendar::{Attendee, CalendarEvent, ChangeBatch, EventDateTime, EventStatus, ResponseStatus};
pub use notification::{
    ChannelId, GroupInfo, MessageId, MessagePayload, PayloadField, ReactionSet,
    ScheduledEventPayload,
};
pub use rsvp::{Response, RsvpRecord};
pub use settings::BotSettings;

/// Chat-platform user identity (a Discord snowflake rendered as a string).
pub type UserId = String;
