//! Discord gateway listener.
//!
//! Translates gateway events for the configured guild into
//! [`InboundEvent`]s and posts command replies back to the channel they
//! came from.

use std::sync::Arc;

use async_trait::async_trait;
use fluffer_core::{CommandContext, InboundEvent, InboundRouter};
use fluffer_domain::{DiscordConfig, FlufferError, Result};
use serenity::all::{
    Client, Context, EventHandler, GatewayIntents, GuildId, GuildScheduledEventUserAddEvent,
    GuildScheduledEventUserRemoveEvent, Message, Reaction, ReactionType, Ready, ShardManager,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Events the bot subscribes to.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_SCHEDULED_EVENTS
}

/// The emoji as the REST reaction endpoints spell it.
pub fn reaction_key(emoji: &ReactionType) -> Option<String> {
    match emoji {
        ReactionType::Unicode(value) => Some(value.clone()),
        ReactionType::Custom { id, name, .. } => {
            Some(format!("{}:{id}", name.as_deref().unwrap_or_default()))
        }
        _ => None,
    }
}

fn command_context(msg: &Message) -> CommandContext {
    CommandContext {
        author: msg.author.id.to_string(),
        content: msg.content.clone(),
        mentions: msg.mentions.iter().map(|user| user.id.to_string()).collect(),
    }
}

struct Handler {
    router: Arc<InboundRouter>,
    guild_id: GuildId,
}

impl Handler {
    fn ours(&self, guild_id: Option<GuildId>) -> bool {
        guild_id == Some(self.guild_id)
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Discord gateway ready");
        self.router.dispatch(InboundEvent::Connected).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot || !self.ours(msg.guild_id) {
            return;
        }
        let Some(reply) = self.router.dispatch(InboundEvent::Message(command_context(&msg))).await
        else {
            return;
        };
        if let Err(e) = msg.channel_id.say(&ctx.http, reply).await {
            warn!(channel = %msg.channel_id, error = %e, "Failed to post command reply");
        }
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        if !self.ours(reaction.guild_id) {
            return;
        }
        let (Some(user), Some(emoji)) = (reaction.user_id, reaction_key(&reaction.emoji)) else {
            debug!(message = %reaction.message_id, "Ignoring reaction without user or emoji");
            return;
        };
        self.router
            .dispatch(InboundEvent::ReactionAdded {
                message_id: reaction.message_id.to_string(),
                emoji,
                user: user.to_string(),
            })
            .await;
    }

    async fn guild_scheduled_event_user_add(
        &self,
        _ctx: Context,
        subscribed: GuildScheduledEventUserAddEvent,
    ) {
        if subscribed.guild_id != self.guild_id {
            return;
        }
        self.router
            .dispatch(InboundEvent::Interest {
                scheduled_event_id: subscribed.scheduled_event_id.to_string(),
                user: subscribed.user_id.to_string(),
                interested: true,
            })
            .await;
    }

    async fn guild_scheduled_event_user_remove(
        &self,
        _ctx: Context,
        unsubscribed: GuildScheduledEventUserRemoveEvent,
    ) {
        if unsubscribed.guild_id != self.guild_id {
            return;
        }
        self.router
            .dispatch(InboundEvent::Interest {
                scheduled_event_id: unsubscribed.scheduled_event_id.to_string(),
                user: unsubscribed.user_id.to_string(),
                interested: false,
            })
            .await;
    }
}

/// Long-lived gateway connection feeding an [`InboundRouter`].
pub struct DiscordGateway {
    token: String,
    guild_id: GuildId,
    router: Arc<InboundRouter>,
    shard_manager: Option<Arc<ShardManager>>,
    task: Option<JoinHandle<()>>,
}

impl DiscordGateway {
    /// # Errors
    /// Returns `FlufferError::Config` when `guild_id` is not a snowflake.
    pub fn new(config: &DiscordConfig, router: Arc<InboundRouter>) -> Result<Self> {
        let guild_id = config
            .guild_id
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
            .map(GuildId::new)
            .ok_or_else(|| {
                FlufferError::Config(format!("Invalid discord guild_id: {}", config.guild_id))
            })?;
        Ok(Self { token: config.token.clone(), guild_id, router, shard_manager: None, task: None })
    }

    /// Connect and start delivering events. Reconnects are handled by the
    /// client; each one re-announces itself through `ready`.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let handler = Handler { router: Arc::clone(&self.router), guild_id: self.guild_id };
        let mut client = Client::builder(&self.token, intents())
            .event_handler(handler)
            .await
            .map_err(|e| FlufferError::Network(format!("Failed to build Discord client: {e}")))?;

        self.shard_manager = Some(Arc::clone(&client.shard_manager));
        self.task = Some(tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!(error = %e, "Discord gateway stopped");
            }
        }));
        info!(guild = %self.guild_id, "Discord gateway started");
        Ok(())
    }

    /// Close every shard and wait for the client task to exit.
    pub async fn stop(&mut self) {
        if let Some(shard_manager) = self.shard_manager.take() {
            shard_manager.shutdown_all().await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Discord gateway task did not exit cleanly");
            }
        }
        info!("Discord gateway stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use serenity::all::EmojiId;

    use super::*;

    #[test]
    fn unicode_reactions_keep_their_text() {
        let emoji = ReactionType::Unicode("\u{2705}".into());
        assert_eq!(reaction_key(&emoji).as_deref(), Some("\u{2705}"));
    }

    #[test]
    fn custom_reactions_use_name_and_id() {
        let emoji = ReactionType::Custom {
            animated: false,
            id: EmojiId::new(42),
            name: Some("party".into()),
        };
        assert_eq!(reaction_key(&emoji).as_deref(), Some("party:42"));
    }

    #[test]
    fn intents_cover_reactions_and_scheduled_events() {
        let intents = intents();
        assert!(intents.contains(GatewayIntents::GUILD_MESSAGE_REACTIONS));
        assert!(intents.contains(GatewayIntents::GUILD_SCHEDULED_EVENTS));
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
    }
}
