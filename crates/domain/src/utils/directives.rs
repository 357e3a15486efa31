//! Event description directive parser.
//!
//! Organisers steer the bot with lines in the calendar description:
//!
//! ```text
//! invite: @core
//! image: https://example.com/banner.png
//! Bring snacks!
//! ```
//!
//! Directive prefixes are case-insensitive, the first line of each kind wins
//! and every matched line is removed from the displayed description.

use once_cell::sync::Lazy;
use regex::Regex;

static DIRECTIVE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(image|invite)\s*:\s*(.*?)\s*$")
        .expect("DIRECTIVE_LINE should compile - this is a bug")
});

/// Result of splitting a description into directives and display text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// Remaining description, trimmed; `None` when nothing is left.
    pub description: Option<String>,
    pub image: Option<String>,
    /// Lower-cased group name without a leading `@`.
    pub invite: Option<String>,
}

/// Parse `image:` and `invite:` directives out of a description.
pub fn parse_directives(description: Option<&str>) -> Directives {
    let Some(text) = description else {
        return Directives::default();
    };

    let mut image: Option<Option<String>> = None;
    let mut invite: Option<Option<String>> = None;
    let mut kept = Vec::new();

    for line in text.lines() {
        let Some(caps) = DIRECTIVE_LINE.captures(line) else {
            kept.push(line);
            continue;
        };
        let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        if caps[1].eq_ignore_ascii_case("image") {
            if image.is_none() {
                image = Some(non_empty(value.to_string()));
            }
        } else if invite.is_none() {
            let group = value.trim_start_matches('@').trim().to_lowercase();
            invite = Some(non_empty(group));
        }
    }

    Directives {
        description: non_empty(kept.join("\n").trim().to_string()),
        image: image.flatten(),
        invite: invite.flatten(),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
