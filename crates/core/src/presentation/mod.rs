//! Presentation of records on the chat surface

pub mod publisher;
pub mod render;
pub mod when;

pub use publisher::Publisher;
pub use render::{mention, render_message, render_scheduled_event};
pub use when::format_when;
