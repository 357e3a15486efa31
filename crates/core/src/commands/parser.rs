//! Free-text command parsing.
//!
//! Parsing never touches state: malformed input becomes a usage reply and
//! text that is not one of our commands is ignored.

use fluffer_domain::Response;

pub const RSVP_USAGE: &str = "Usage: `rsvp <event id> [yes|no|zoom|undecided|invite|uninvite]`";
pub const RSVP_RESPONSES: &str =
    "RSVP with one of: `yes`, `no`, `zoom`, `undecided`, `invite`, or `uninvite`";
pub const GOOGLE_USAGE: &str = "Provide a Google account e-mail address or `off`";
pub const CHANNEL_USAGE: &str = "Need a role name and a channel";
pub const EDIT_USAGE: &str = "Usage: `edit <event id> color <role>|resend|delete|invite`";
pub const EDIT_ACTIONS: &str = "Specify one of: `color`, `delete`, `resend`, `invite`";
pub const COLOR_USAGE: &str = "Specify the role to take the color from";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Rsvp { event_id: String, response: Response },
    Google(GoogleAction),
    Channel { role: String, channel: String },
    Edit { event_id: String, action: EditAction },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleAction {
    Query,
    Off,
    Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditAction {
    Color(String),
    Resend,
    Delete,
    Invite,
}

/// Parse a chat message.
///
/// Returns `None` when the message is not addressed to us, `Some(Err(reply))`
/// when it is but the arguments are malformed.
pub fn parse(content: &str, prefix: &str) -> Option<Result<Command, String>> {
    let rest = content.trim_start().strip_prefix(prefix)?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    let args: Vec<&str> = words.collect();

    match name.as_str() {
        "rsvp" => Some(parse_rsvp(&without_user_mentions(&args))),
        "google" => Some(parse_google(&without_user_mentions(&args))),
        "channel" => Some(parse_channel(&args)),
        "edit" => Some(parse_edit(&args)),
        _ => None,
    }
}

fn parse_rsvp(args: &[&str]) -> Result<Command, String> {
    let Some(event_id) = args.first() else {
        return Err(RSVP_USAGE.to_string());
    };
    let response = match args.get(1) {
        None => Response::Yes,
        Some(word) => Response::parse(word).ok_or_else(|| RSVP_RESPONSES.to_string())?,
    };
    Ok(Command::Rsvp { event_id: (*event_id).to_string(), response })
}

fn parse_google(args: &[&str]) -> Result<Command, String> {
    match args.first().map(|word| word.to_lowercase()) {
        None => Ok(Command::Google(GoogleAction::Query)),
        Some(word) if word == "off" => Ok(Command::Google(GoogleAction::Off)),
        Some(email) if looks_like_email(&email) => Ok(Command::Google(GoogleAction::Link(email))),
        Some(_) => Err(GOOGLE_USAGE.to_string()),
    }
}

fn parse_channel(args: &[&str]) -> Result<Command, String> {
    let (Some(role), Some(channel)) = (args.first(), args.get(1)) else {
        return Err(CHANNEL_USAGE.to_string());
    };
    let role = role.trim_start_matches('@').to_lowercase();
    let channel = channel.trim_start_matches('#').to_lowercase();
    if role.is_empty() || channel.is_empty() {
        return Err(CHANNEL_USAGE.to_string());
    }
    Ok(Command::Channel { role, channel })
}

fn parse_edit(args: &[&str]) -> Result<Command, String> {
    let Some(event_id) = args.first() else {
        return Err(EDIT_USAGE.to_string());
    };
    let action = match args.get(1).map(|word| word.to_lowercase()).as_deref() {
        Some("color") => {
            let role = args
                .get(2)
                .map(|role| role.trim_start_matches('@').to_lowercase())
                .filter(|role| !role.is_empty())
                .ok_or_else(|| COLOR_USAGE.to_string())?;
            EditAction::Color(role)
        }
        Some("resend") => EditAction::Resend,
        Some("delete") => EditAction::Delete,
        Some("invite") => EditAction::Invite,
        _ => return Err(EDIT_ACTIONS.to_string()),
    };
    Ok(Command::Edit { event_id: (*event_id).to_string(), action })
}

/// Drop `<@id>`/`<@!id>` user mentions and bare `@name` tokens.
fn without_user_mentions<'a>(args: &[&'a str]) -> Vec<&'a str> {
    args.iter()
        .copied()
        .filter(|arg| {
            let user_mention = arg.starts_with("<@") && !arg.starts_with("<@&");
            !(user_mention || arg.starts_with('@'))
        })
        .collect()
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}
