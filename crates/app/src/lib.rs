//! # Fluffer App
//!
//! Process layer - wiring and the main entry point.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Logging setup
//! - Main entry point
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires the calendar and chat adapters into the engine
//! - Owns the scheduler lifecycle

pub mod context;
pub mod logging;

pub use context::AppContext;
