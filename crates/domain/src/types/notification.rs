//! Chat-surface payloads and lookups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

pub type ChannelId = String;
pub type MessageId = String;

/// A named group (Discord role) resolved to its current members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub members: Vec<UserId>,
    /// `None` when the role has no color assigned.
    pub color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl PayloadField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), inline: false }
    }
}

/// Rendered announcement message (a single embed on Discord).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub color: Option<u32>,
    pub fields: Vec<PayloadField>,
    pub footer: String,
    pub footer_icon: Option<String>,
}

impl MessagePayload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }
}

/// Companion scheduled event mirrored on the chat surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEventPayload {
    pub name: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
}

/// Users that reacted to a message with one emoji.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSet {
    pub emoji: String,
    pub users: Vec<UserId>,
}
