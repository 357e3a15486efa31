//! Periodic reconciliation driver
//!
//! The scheduler follows the runtime rules every background task here obeys:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Structured tracing per tick

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig, TickRunner};
