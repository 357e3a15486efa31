//! Attendance reconciliation between the calendar and the chat surface

pub mod engine;
pub mod ingest;
pub mod invites;
pub mod merge;
pub mod ports;
pub mod store;
pub mod visibility;

pub use engine::{EngineSettings, RsvpEngine, TickSummary};
pub use ports::*;
pub use store::RsvpStore;
