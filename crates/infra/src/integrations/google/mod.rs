//! Google Calendar v3 adapter
//!
//! Implements the `CalendarSource` port over the REST API using a stored
//! OAuth refresh token.

pub mod auth;
pub mod provider;
pub mod types;

pub use auth::GoogleTokenProvider;
pub use provider::GoogleCalendarSource;
