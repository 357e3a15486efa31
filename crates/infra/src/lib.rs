//! # Fluffer Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite key/value persistence
//! - HTTP client with retry and rate-limit handling
//! - Google Calendar and Discord REST adapters
//! - The Discord gateway listener for inbound chat events
//! - Configuration loading
//! - The periodic sync scheduler
//!
//! ## Architecture
//! - Implements traits defined in `fluffer-core`
//! - Contains all "impure" code (I/O, network, disk)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod redact;
pub mod scheduling;

// Re-export commonly used items
pub use database::{DbManager, SqliteKeyValueStore};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::{DiscordGateway, DiscordSurface, GoogleCalendarSource};
pub use redact::redact_email;
pub use scheduling::{SchedulerError, SyncScheduler, SyncSchedulerConfig};
