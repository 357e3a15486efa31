//! # Fluffer Domain
//!
//! Business domain types and models for Fluffer.
//!
//! This crate contains:
//! - The RSVP record and the invariant-preserving response mutations
//! - Calendar and notification-surface data types shared by every port
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Description directive parsing and relative-time formatting
//!
//! ## Architecture
//! - No dependencies on other Fluffer crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::directives::{parse_directives, Directives};
pub use utils::relative_time::relative_time;
