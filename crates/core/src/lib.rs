//! # Fluffer Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The reconciliation engine (ingestion, invites, attendance merge,
//!   visibility and the per-record side-effect pipeline)
//! - The presentation projection and the publisher that applies it
//! - The chat command handler and the router for inbound chat events
//! - Port interfaces (traits) for the calendar, the chat surface and storage
//!
//! ## Architecture Principles
//! - Only depends on `fluffer-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod commands;
pub mod inbound;
pub mod presentation;
pub mod rsvp;

pub use commands::{CommandContext, CommandHandler};
pub use inbound::{InboundEvent, InboundRouter};
pub use presentation::{render_message, render_scheduled_event, Publisher};
pub use rsvp::ports::{CalendarSource, KeyValueStore, NotificationSurface};
pub use rsvp::{EngineSettings, RsvpEngine, RsvpStore, TickSummary};
