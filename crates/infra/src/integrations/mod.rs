//! External service integrations

pub mod discord;
pub mod google;

pub use discord::{DiscordGateway, DiscordSurface};
pub use google::{GoogleCalendarSource, GoogleTokenProvider};
