//! Executes parsed commands against the engine and words the replies.

use std::sync::Arc;

use fluffer_domain::{Result, UserId};
use tracing::{error, info, instrument};

use super::parser::{self, Command, EditAction, GoogleAction};
use crate::presentation::mention;
use crate::rsvp::ports::NotificationSurface;
use crate::rsvp::RsvpEngine;

/// An inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandContext {
    pub author: UserId,
    pub content: String,
    /// Users mentioned in the message, in order.
    pub mentions: Vec<UserId>,
}

impl CommandContext {
    /// The user a command acts on: the first mention, else the author.
    fn target(&self) -> &str {
        self.mentions.first().unwrap_or(&self.author)
    }

    /// How replies refer to the target.
    fn you(&self) -> String {
        match self.mentions.first() {
            Some(user) => mention(user),
            None => "you".to_string(),
        }
    }
}

pub struct CommandHandler {
    engine: Arc<RsvpEngine>,
    surface: Arc<dyn NotificationSurface>,
    prefix: String,
}

impl CommandHandler {
    pub fn new(
        engine: Arc<RsvpEngine>,
        surface: Arc<dyn NotificationSurface>,
        prefix: impl Into<String>,
    ) -> Self {
        Self { engine, surface, prefix: prefix.into() }
    }

    /// Handle a chat message; `None` when it is not a command.
    #[instrument(skip(self, ctx), fields(author = %ctx.author))]
    pub async fn handle(&self, ctx: &CommandContext) -> Option<String> {
        let command = match parser::parse(&ctx.content, &self.prefix)? {
            Ok(command) => command,
            Err(usage) => return Some(usage),
        };

        info!(?command, "Handling command");
        match self.execute(command, ctx).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(error = %e, "Command failed");
                Some("Sorry, something went wrong. Try again in a bit.".to_string())
            }
        }
    }

    async fn execute(&self, command: Command, ctx: &CommandContext) -> Result<String> {
        match command {
            Command::Rsvp { event_id, response } => {
                let updated = self.engine.change_response(&event_id, ctx.target(), response).await?;
                Ok(match updated {
                    Some(record) => format!(
                        "Okay, I've marked {} as {} {}",
                        ctx.you(),
                        response.describe(),
                        record.title
                    ),
                    None => "Unknown event".to_string(),
                })
            }
            Command::Google(action) => self.google(action, ctx).await,
            Command::Channel { role, channel } => {
                if self.surface.resolve_group(&role).await?.is_none() {
                    return Ok("Unknown role".to_string());
                }
                if self.surface.resolve_channel(&channel).await?.is_none() {
                    return Ok("Unknown channel".to_string());
                }
                self.engine.set_channel(&role, &channel).await?;
                Ok(format!("Okay! I'll send invites for @{role} to #{channel} now."))
            }
            Command::Edit { event_id, action } => self.edit(&event_id, action).await,
        }
    }

    async fn google(&self, action: GoogleAction, ctx: &CommandContext) -> Result<String> {
        let who = ctx.target();
        let you = ctx.you();

        match action {
            GoogleAction::Query => {
                let settings = self.engine.settings().await;
                Ok(match settings.email_for(who) {
                    Some(email) => format!(
                        "I'm inviting {you} to events on `{email}`. Provide a new address or `off` to change that."
                    ),
                    None => {
                        let subject = match ctx.mentions.first() {
                            Some(user) => format!("{} isn't", mention(user)),
                            None => "You're not".to_string(),
                        };
                        format!(
                            "{subject} getting calendar invites to events. {}",
                            parser::GOOGLE_USAGE
                        )
                    }
                })
            }
            GoogleAction::Off => Ok(match self.engine.set_account(who, None).await? {
                Some(_) => format!("Okay, I won't invite {you} on Google Calendar anymore."),
                None => format!("I wasn't inviting {you} to events on Google Calendar anyway!"),
            }),
            GoogleAction::Link(email) => {
                self.engine.set_account(who, Some(email.clone())).await?;
                Ok(format!(
                    "Okay! I'll invite {you} to events on Google Calendar using `{email}` from now on."
                ))
            }
        }
    }

    async fn edit(&self, event_id: &str, action: EditAction) -> Result<String> {
        let Some(record) = self.engine.record(event_id).await? else {
            return Ok("Unknown event".to_string());
        };
        let title = record.title;

        let done = match action {
            EditAction::Color(role) => {
                let color = self.surface.resolve_group(&role).await?.and_then(|group| group.color);
                let Some(color) = color else {
                    return Ok("Unknown role".to_string());
                };
                self.engine
                    .recolor(event_id, color)
                    .await?
                    .map(|_| format!("Okay I've updated the color for {title}"))
            }
            EditAction::Resend => self
                .engine
                .resend(event_id)
                .await?
                .map(|_| format!("Okay, I've announced {title} again")),
            EditAction::Delete => self
                .engine
                .cancel(event_id)
                .await?
                .map(|_| format!("Okay, I've cancelled {title}")),
            EditAction::Invite => self
                .engine
                .send_invites(event_id)
                .await?
                .map(|_| format!("Okay, I'll send invites for {title}")),
        };
        Ok(done.unwrap_or_else(|| "Unknown event".to_string()))
    }
}
