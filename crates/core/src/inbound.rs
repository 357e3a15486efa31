//! Routing of inbound chat traffic.
//!
//! A chat transport translates its own events into [`InboundEvent`] and hands
//! them to [`InboundRouter::dispatch`]; the router decides which engine or
//! command entry point handles each one.

use std::sync::Arc;

use fluffer_domain::{MessageId, UserId};
use tracing::{debug, info, warn};

use crate::commands::{CommandContext, CommandHandler};
use crate::rsvp::RsvpEngine;

/// Something a chat user did that the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message in the guild; may or may not be a command.
    Message(CommandContext),
    /// A reaction added to some message.
    ReactionAdded { message_id: MessageId, emoji: String, user: UserId },
    /// A user (un)subscribed from a companion scheduled event.
    Interest { scheduled_event_id: String, user: UserId, interested: bool },
    /// The transport (re)connected and may have missed reactions.
    Connected,
}

pub struct InboundRouter {
    engine: Arc<RsvpEngine>,
    commands: Arc<CommandHandler>,
}

impl InboundRouter {
    pub fn new(engine: Arc<RsvpEngine>, commands: Arc<CommandHandler>) -> Self {
        Self { engine, commands }
    }

    /// Handle one event. Returns the reply to post for command messages.
    ///
    /// Engine failures are logged here; the transport has nobody to report
    /// them to.
    pub async fn dispatch(&self, event: InboundEvent) -> Option<String> {
        match event {
            InboundEvent::Message(ctx) => self.commands.handle(&ctx).await,
            InboundEvent::ReactionAdded { message_id, emoji, user } => {
                match self.engine.handle_reaction(&message_id, &emoji, &user).await {
                    Ok(changed) => debug!(%message_id, %user, changed, "Reaction routed"),
                    Err(e) => warn!(%message_id, %user, error = %e, "Failed to handle reaction"),
                }
                None
            }
            InboundEvent::Interest { scheduled_event_id, user, interested } => {
                match self.engine.handle_interest(&scheduled_event_id, &user, interested).await {
                    Ok(changed) => debug!(%scheduled_event_id, %user, changed, "Interest routed"),
                    Err(e) => {
                        warn!(%scheduled_event_id, %user, error = %e, "Failed to handle interest")
                    }
                }
                None
            }
            InboundEvent::Connected => {
                info!("Chat transport connected, scheduling reaction catch-up");
                self.engine.request_reaction_catch_up();
                None
            }
        }
    }
}
