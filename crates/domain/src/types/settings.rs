//! Process-wide settings persisted under the `settings` key

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::UserId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSettings {
    /// Opted-in calendar addresses, by user.
    #[serde(default)]
    pub accounts: BTreeMap<UserId, String>,
    /// Announcement channel name, by lower-cased role name.
    #[serde(default)]
    pub channels: BTreeMap<String, String>,
}

impl BotSettings {
    pub fn email_for(&self, user: &str) -> Option<&str> {
        self.accounts.get(user).map(String::as_str)
    }

    /// Channel name for an invite group, falling back to `default_channel`.
    pub fn channel_for<'a>(&'a self, invite: Option<&str>, default_channel: &'a str) -> &'a str {
        invite
            .and_then(|role| self.channels.get(role))
            .map(String::as_str)
            .unwrap_or(default_channel)
    }
}
