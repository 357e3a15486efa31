//! The RSVP record: locally owned attendance and visibility state for one
//! calendar event.
//!
//! All response mutations go through the methods here so that
//! `yes ∩ no = ∅`, `zoom ⊆ yes` and `yes ∪ no ∪ interested ⊆ invited` hold
//! after every call.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::ResponseStatus;
use super::UserId;
use crate::constants::{DEFAULT_TITLE, RSVP_KEY_PREFIX};

/// A local response, as given by a reaction or the `rsvp` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Yes,
    No,
    /// Going, but remotely.
    Zoom,
    /// Invited without an answer. Also what `invite` means.
    Undecided,
    Uninvite,
}

impl Response {
    /// Parse a command argument. `invite` is an alias for `undecided`.
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "zoom" => Some(Self::Zoom),
            "undecided" | "invite" => Some(Self::Undecided),
            "uninvite" => Some(Self::Uninvite),
            _ => None,
        }
    }

    /// Phrase used in command confirmations ("marked you as ...").
    pub fn describe(self) -> &'static str {
        match self {
            Self::Yes => "going to",
            Self::No => "not going to",
            Self::Zoom => "remotely participating on",
            Self::Undecided => "undecided on",
            Self::Uninvite => "uninvited from",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsvpRecord {
    pub event_id: String,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub invite: Option<String>,
    #[serde(default)]
    pub color: Option<u32>,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub all_day: bool,

    #[serde(default)]
    pub invited: BTreeSet<UserId>,
    #[serde(default)]
    pub yes: BTreeSet<UserId>,
    #[serde(default)]
    pub no: BTreeSet<UserId>,
    #[serde(default)]
    pub zoom: BTreeSet<UserId>,
    #[serde(default)]
    pub interested: BTreeSet<UserId>,
    /// Identities whose local response has not been written to the calendar.
    #[serde(default)]
    pub changed: BTreeSet<UserId>,

    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub scheduled_event_id: Option<String>,

    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub past: bool,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub posted: bool,
    #[serde(default)]
    pub significant_change: bool,
    /// The announcement lags behind the record; set until a publish succeeds.
    #[serde(default)]
    pub needs_publish: bool,
    #[serde(default)]
    pub from_now: String,
}

impl RsvpRecord {
    pub fn new(event_id: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            event_id: event_id.into(),
            title: DEFAULT_TITLE.to_string(),
            location: None,
            description: None,
            image: None,
            invite: None,
            color: None,
            start,
            end: None,
            all_day: false,
            invited: BTreeSet::new(),
            yes: BTreeSet::new(),
            no: BTreeSet::new(),
            zoom: BTreeSet::new(),
            interested: BTreeSet::new(),
            changed: BTreeSet::new(),
            message_id: None,
            scheduled_event_id: None,
            cancelled: false,
            past: false,
            hide: false,
            posted: false,
            significant_change: false,
            needs_publish: false,
            from_now: String::new(),
        }
    }

    /// Persistence key for this record.
    pub fn key(&self) -> String {
        Self::key_for(&self.event_id)
    }

    pub fn key_for(event_id: &str) -> String {
        format!("{RSVP_KEY_PREFIX}{event_id}")
    }

    /// Status the calendar should show for `user` given local state.
    pub fn implied_status(&self, user: &str) -> ResponseStatus {
        if self.yes.contains(user) {
            ResponseStatus::Accepted
        } else if self.no.contains(user) {
            ResponseStatus::Declined
        } else {
            ResponseStatus::NeedsAction
        }
    }

    /// Apply a locally originated response and mark it for write-back.
    ///
    /// Returns `false` when the record already reflected `response`.
    pub fn change_response(&mut self, user: &str, response: Response) -> bool {
        let before = self.snapshot(user);

        match response {
            Response::Uninvite => {
                self.invited.remove(user);
                self.yes.remove(user);
                self.no.remove(user);
                self.zoom.remove(user);
                self.interested.remove(user);
            }
            Response::Yes => {
                self.invited.insert(user.to_string());
                self.no.remove(user);
                self.yes.insert(user.to_string());
                self.zoom.remove(user);
            }
            Response::Zoom => {
                self.invited.insert(user.to_string());
                self.no.remove(user);
                self.yes.insert(user.to_string());
                self.zoom.insert(user.to_string());
            }
            Response::No => {
                self.invited.insert(user.to_string());
                self.yes.remove(user);
                self.zoom.remove(user);
                self.no.insert(user.to_string());
            }
            Response::Undecided => {
                self.invited.insert(user.to_string());
                self.yes.remove(user);
                self.no.remove(user);
                self.zoom.remove(user);
            }
        }

        let changed = self.snapshot(user) != before;
        if changed {
            self.changed.insert(user.to_string());
        }
        changed
    }

    /// Apply a response that originated on the calendar side.
    ///
    /// Does not touch `changed`: the calendar already holds this state.
    /// Answering on the calendar side counts as being invited.
    pub fn apply_external_status(&mut self, user: &str, status: ResponseStatus) {
        match status.normalized() {
            ResponseStatus::Accepted => {
                self.invited.insert(user.to_string());
                self.no.remove(user);
                self.yes.insert(user.to_string());
            }
            ResponseStatus::Declined => {
                self.invited.insert(user.to_string());
                self.yes.remove(user);
                self.zoom.remove(user);
                self.no.insert(user.to_string());
            }
            _ => {
                self.yes.remove(user);
                self.no.remove(user);
                self.zoom.remove(user);
            }
        }
    }

    /// Add an invitee from group membership. Returns `true` if new.
    pub fn invite_user(&mut self, user: &str) -> bool {
        if self.invited.insert(user.to_string()) {
            self.changed.insert(user.to_string());
            true
        } else {
            false
        }
    }

    /// Track the platform-native "interested" signal.
    ///
    /// Subscribing also invites the user; unsubscribing only clears the
    /// interest flag and leaves any explicit response alone.
    pub fn set_interest(&mut self, user: &str, interested: bool) -> bool {
        if interested {
            let added = self.interested.insert(user.to_string());
            let invited = self.invite_user(user);
            added || invited
        } else {
            self.interested.remove(user)
        }
    }

    /// Names of violated invariants; empty when the record is consistent.
    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if !self.yes.is_disjoint(&self.no) {
            violations.push("yes and no overlap");
        }
        if !self.zoom.is_subset(&self.yes) {
            violations.push("zoom not a subset of yes");
        }
        if !self.yes.is_subset(&self.invited)
            || !self.no.is_subset(&self.invited)
            || !self.zoom.is_subset(&self.invited)
            || !self.interested.is_subset(&self.invited)
        {
            violations.push("responder not invited");
        }
        // `changed` may name uninvited users until the next merge drops
        // their calendar attendee, so it is not held to `invited`.
        if self.past && !self.hide {
            violations.push("past but not hidden");
        }
        violations
    }

    fn snapshot(&self, user: &str) -> (bool, bool, bool, bool, bool) {
        (
            self.invited.contains(user),
            self.yes.contains(user),
            self.no.contains(user),
            self.zoom.contains(user),
            self.interested.contains(user),
        )
    }
}
