//! Chat commands: `rsvp`, `google`, `channel` and `edit`

pub mod handler;
pub mod parser;

pub use handler::{CommandContext, CommandHandler};
pub use parser::{parse, Command, EditAction, GoogleAction};
