//! Discord API v10 wire types.

use chrono::{DateTime, Utc};
use fluffer_domain::{MessagePayload, ScheduledEventPayload};
use serde::{Deserialize, Serialize};

/// Text and announcement channels can hold announcements.
pub const GUILD_TEXT: u8 = 0;
pub const GUILD_ANNOUNCEMENT: u8 = 5;

/// `EXTERNAL` scheduled events carry a free-form location.
pub const ENTITY_TYPE_EXTERNAL: u8 = 3;
pub const PRIVACY_GUILD_ONLY: u8 = 2;

/// Discord rejects external events without a location.
pub const FALLBACK_LOCATION: &str = "See announcement";

const MAX_EVENT_NAME: usize = 100;
const MAX_EVENT_DESCRIPTION: usize = 1000;
const MAX_EVENT_LOCATION: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    /// Guild nickname, then global display name, then username.
    pub fn display_name(&self) -> Option<String> {
        let user = self.user.as_ref()?;
        Some(
            self.nick
                .clone()
                .or_else(|| user.global_name.clone())
                .unwrap_or_else(|| user.username.clone()),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Emoji {
    /// Form used both in reaction URLs and as the emoji key handed to the
    /// engine: the character itself, or `name:id` for custom emoji.
    pub fn key(&self) -> Option<String> {
        match (&self.name, &self.id) {
            (Some(name), Some(id)) => Some(format!("{name}:{id}")),
            (Some(name), None) => Some(name.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageReaction {
    pub emoji: Emoji,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub reactions: Vec<MessageReaction>,
}

/// Any created object; only the id is needed.
#[derive(Debug, Clone, Deserialize)]
pub struct Created {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedField<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct Embed<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage<'a>>,
    pub fields: Vec<EmbedField<'a>>,
    pub footer: EmbedFooter<'a>,
}

impl<'a> From<&'a MessagePayload> for Embed<'a> {
    fn from(payload: &'a MessagePayload) -> Self {
        Self {
            title: &payload.title,
            description: payload.description.as_deref(),
            color: payload.color,
            image: payload.image.as_deref().map(|url| EmbedImage { url }),
            fields: payload
                .fields
                .iter()
                .map(|f| EmbedField { name: &f.name, value: &f.value, inline: f.inline })
                .collect(),
            footer: EmbedFooter { text: &payload.footer, icon_url: payload.footer_icon.as_deref() },
        }
    }
}

/// Message create/edit body.
#[derive(Debug, Serialize)]
pub struct MessageBody<'a> {
    pub embeds: [Embed<'a>; 1],
}

impl<'a> From<&'a MessagePayload> for MessageBody<'a> {
    fn from(payload: &'a MessagePayload) -> Self {
        Self { embeds: [Embed::from(payload)] }
    }
}

#[derive(Debug, Serialize)]
pub struct EntityMetadata {
    pub location: String,
}

/// Guild scheduled event create/modify body.
#[derive(Debug, Serialize)]
pub struct ScheduledEventBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scheduled_start_time: DateTime<Utc>,
    pub scheduled_end_time: DateTime<Utc>,
    pub privacy_level: u8,
    pub entity_type: u8,
    pub entity_metadata: EntityMetadata,
}

impl From<&ScheduledEventPayload> for ScheduledEventBody {
    fn from(payload: &ScheduledEventPayload) -> Self {
        let location = payload
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(FALLBACK_LOCATION);
        Self {
            name: truncate(&payload.name, MAX_EVENT_NAME),
            description: payload.description.as_deref().map(|d| truncate(d, MAX_EVENT_DESCRIPTION)),
            scheduled_start_time: payload.start,
            scheduled_end_time: payload.end,
            privacy_level: PRIVACY_GUILD_ONLY,
            entity_type: ENTITY_TYPE_EXTERNAL,
            entity_metadata: EntityMetadata { location: truncate(location, MAX_EVENT_LOCATION) },
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
