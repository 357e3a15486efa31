//! `NotificationSurface` over the Discord REST API.

use async_trait::async_trait;
use dashmap::DashMap;
use fluffer_core::NotificationSurface;
use fluffer_domain::{
    ChannelId, DiscordConfig, FlufferError, GroupInfo, MessageId, MessagePayload, ReactionSet,
    Result, ScheduledEventPayload, UserId,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::types::{
    Channel, Created, Member, Message, MessageBody, Role, ScheduledEventBody, User,
    GUILD_ANNOUNCEMENT, GUILD_TEXT,
};
use crate::http::HttpClient;

const MEMBER_PAGE_SIZE: usize = 1000;
const REACTION_PAGE_SIZE: usize = 100;

pub struct DiscordSurface {
    http: HttpClient,
    base_url: String,
    token: String,
    guild_id: String,
    scheduled_events: bool,
    bot_user: OnceCell<UserId>,
    display_names: DashMap<UserId, String>,
}

impl DiscordSurface {
    /// # Errors
    /// Returns `FlufferError::Config` when `api_base_url` is not a valid URL.
    pub fn new(config: &DiscordConfig, http: HttpClient) -> Result<Self> {
        Url::parse(&config.api_base_url)
            .map_err(|e| FlufferError::Config(format!("Invalid discord api_base_url: {e}")))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            guild_id: config.guild_id.clone(),
            scheduled_events: true,
            bot_user: OnceCell::new(),
            display_names: DashMap::new(),
        })
    }

    /// Turn companion scheduled events on or off.
    pub fn with_scheduled_events(mut self, enabled: bool) -> Self {
        self.scheduled_events = enabled;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.http.send_json(self.request(Method::GET, path)).await
    }

    /// Deletes treat an already-missing target as done.
    async fn delete(&self, path: &str) -> Result<()> {
        match self.http.send_empty(self.request(Method::DELETE, path)).await {
            Err(FlufferError::NotFound(_)) => {
                debug!(path, "Delete target already gone");
                Ok(())
            }
            other => other,
        }
    }

    fn guild_path(&self, rest: &str) -> String {
        format!("/guilds/{}{}", self.guild_id, rest)
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let mut members = Vec::new();
        let mut after = String::from("0");
        loop {
            let path = self.guild_path(&format!("/members?limit={MEMBER_PAGE_SIZE}&after={after}"));
            let page: Vec<Member> = self.get(&path).await?;
            let count = page.len();
            if let Some(last) = page.last().and_then(|m| m.user.as_ref()) {
                after = last.id.clone();
            }
            members.extend(page);
            if count < MEMBER_PAGE_SIZE {
                break;
            }
        }
        Ok(members)
    }

    fn remember_name(&self, member: &Member) {
        if let (Some(user), Some(name)) = (member.user.as_ref(), member.display_name()) {
            self.display_names.insert(user.id.clone(), name);
        }
    }

    async fn reaction_users(
        &self,
        channel: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<UserId>> {
        let encoded = urlencoding::encode(emoji);
        let base = format!("/channels/{channel}/messages/{message_id}/reactions/{encoded}");
        let mut users = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let mut path = format!("{base}?limit={REACTION_PAGE_SIZE}");
            if let Some(after) = &after {
                path.push_str(&format!("&after={after}"));
            }
            let page: Vec<User> = self.get(&path).await?;
            let count = page.len();
            after = page.last().map(|u| u.id.clone());
            users.extend(page.into_iter().map(|u| u.id));
            if count < REACTION_PAGE_SIZE {
                break;
            }
        }
        Ok(users)
    }
}

#[async_trait]
impl NotificationSurface for DiscordSurface {
    #[instrument(skip(self))]
    async fn resolve_group(&self, name: &str) -> Result<Option<GroupInfo>> {
        let roles: Vec<Role> = self.get(&self.guild_path("/roles")).await?;
        let Some(role) = roles.into_iter().find(|r| r.name.to_lowercase() == name) else {
            debug!("No role with that name");
            return Ok(None);
        };

        let members = self.list_members().await?;
        for member in &members {
            self.remember_name(member);
        }
        let mut ids: Vec<UserId> = members
            .iter()
            .filter(|m| m.roles.contains(&role.id))
            .filter_map(|m| m.user.as_ref().map(|u| u.id.clone()))
            .collect();
        ids.sort();

        debug!(role_id = %role.id, members = ids.len(), "Resolved role");
        Ok(Some(GroupInfo {
            name: role.name,
            members: ids,
            color: (role.color != 0).then_some(role.color),
        }))
    }

    async fn resolve_display_name(&self, user: &str) -> Result<String> {
        if let Some(name) = self.display_names.get(user) {
            return Ok(name.clone());
        }

        let name = match self.get::<Member>(&self.guild_path(&format!("/members/{user}"))).await {
            Ok(member) => member.display_name(),
            Err(FlufferError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let name = match name {
            Some(name) => name,
            // Left the guild; fall back to the global profile.
            None => {
                let profile: User = self.get(&format!("/users/{user}")).await?;
                profile.global_name.unwrap_or(profile.username)
            }
        };

        self.display_names.insert(user.to_string(), name.clone());
        Ok(name)
    }

    #[instrument(skip(self))]
    async fn resolve_channel(&self, name: &str) -> Result<Option<ChannelId>> {
        let channels: Vec<Channel> = self.get(&self.guild_path("/channels")).await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.kind == GUILD_TEXT || c.kind == GUILD_ANNOUNCEMENT)
            .find(|c| c.name.as_deref().is_some_and(|n| n.to_lowercase() == name))
            .map(|c| c.id))
    }

    async fn current_user_id(&self) -> Result<UserId> {
        self.bot_user
            .get_or_try_init(|| async {
                let me: User = self.get("/users/@me").await?;
                info!(bot_user = %me.id, "Resolved bot identity");
                Ok::<_, FlufferError>(me.id)
            })
            .await
            .cloned()
    }

    #[instrument(skip(self, payload), fields(title = %payload.title))]
    async fn create_message(&self, channel: &str, payload: &MessagePayload) -> Result<MessageId> {
        let created: Created = self
            .http
            .send_json(
                self.request(Method::POST, &format!("/channels/{channel}/messages"))
                    .json(&MessageBody::from(payload)),
            )
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self, payload))]
    async fn edit_message(
        &self,
        channel: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> Result<()> {
        self.http
            .send_empty(
                self.request(Method::PATCH, &format!("/channels/{channel}/messages/{message_id}"))
                    .json(&MessageBody::from(payload)),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<()> {
        self.delete(&format!("/channels/{channel}/messages/{message_id}")).await
    }

    async fn pin_message(&self, channel: &str, message_id: &str) -> Result<()> {
        let path = format!("/channels/{channel}/pins/{message_id}");
        self.http.send_empty(self.request(Method::PUT, &path)).await
    }

    async fn unpin_message(&self, channel: &str, message_id: &str) -> Result<()> {
        self.delete(&format!("/channels/{channel}/pins/{message_id}")).await
    }

    async fn add_reaction(&self, channel: &str, message_id: &str, emoji: &str) -> Result<()> {
        let encoded = urlencoding::encode(emoji);
        self.http
            .send_empty(self.request(
                Method::PUT,
                &format!("/channels/{channel}/messages/{message_id}/reactions/{encoded}/@me"),
            ))
            .await
    }

    #[instrument(skip(self))]
    async fn enumerate_reactions(
        &self,
        channel: &str,
        message_id: &str,
    ) -> Result<Vec<ReactionSet>> {
        let message: Message =
            self.get(&format!("/channels/{channel}/messages/{message_id}")).await?;

        let mut sets = Vec::with_capacity(message.reactions.len());
        for reaction in message.reactions.iter().filter(|r| r.count > 0) {
            let Some(emoji) = reaction.emoji.key() else { continue };
            let users = self.reaction_users(channel, message_id, &emoji).await?;
            sets.push(ReactionSet { emoji, users });
        }
        Ok(sets)
    }

    async fn remove_user_reaction(
        &self,
        channel: &str,
        message_id: &str,
        emoji: &str,
        user: &str,
    ) -> Result<()> {
        let encoded = urlencoding::encode(emoji);
        let path = format!("/channels/{channel}/messages/{message_id}/reactions/{encoded}/{user}");
        self.delete(&path).await
    }

    fn supports_scheduled_events(&self) -> bool {
        self.scheduled_events
    }

    #[instrument(skip(self, payload), fields(name = %payload.name))]
    async fn create_scheduled_event(&self, payload: &ScheduledEventPayload) -> Result<String> {
        let created: Created = self
            .http
            .send_json(
                self.request(Method::POST, &self.guild_path("/scheduled-events"))
                    .json(&ScheduledEventBody::from(payload)),
            )
            .await?;
        Ok(created.id)
    }

    #[instrument(skip(self, payload))]
    async fn edit_scheduled_event(&self, id: &str, payload: &ScheduledEventPayload) -> Result<()> {
        self.http
            .send_empty(
                self.request(Method::PATCH, &self.guild_path(&format!("/scheduled-events/{id}")))
                    .json(&ScheduledEventBody::from(payload)),
            )
            .await
    }

    #[instrument(skip(self))]
    async fn delete_scheduled_event(&self, id: &str) -> Result<()> {
        match self.delete(&self.guild_path(&format!("/scheduled-events/{id}"))).await {
            Err(FlufferError::InvalidInput(msg)) => {
                // Events that already started cannot be deleted, only ended.
                warn!(id, reason = %msg, "Scheduled event could not be deleted");
                Ok(())
            }
            other => other,
        }
    }
}
