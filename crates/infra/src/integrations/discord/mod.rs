//! Discord adapters
//!
//! `client` implements the `NotificationSurface` port over REST: roles as
//! invite groups, text channels, embed messages with reactions and pins, and
//! guild scheduled events. `gateway` listens for messages, reactions and
//! scheduled-event subscriptions and routes them into the engine.

pub mod client;
pub mod gateway;
pub mod types;

pub use client::DiscordSurface;
pub use gateway::DiscordGateway;
