//! Attendance merge between the record and the calendar attendee list.
//!
//! Direction of truth per identity: a pending local change (the identity is
//! in `changed`) overwrites the calendar; otherwise a differing calendar
//! status is copied into the record. Either way the identity leaves
//! `changed`, so a status written out is not read back as a new change.

use std::collections::{BTreeMap, BTreeSet};

use fluffer_domain::{Attendee, RsvpRecord, UserId};

/// Two-way mapping between identities and calendar addresses.
#[derive(Debug, Clone, Default)]
pub struct EmailDirectory {
    by_user: BTreeMap<UserId, String>,
    by_email: BTreeMap<String, UserId>,
}

impl EmailDirectory {
    pub fn insert(&mut self, user: impl Into<UserId>, email: impl Into<String>) {
        let user = user.into();
        let email = email.into();
        self.by_email.insert(email.to_lowercase(), user.clone());
        self.by_user.insert(user, email);
    }

    pub fn email(&self, user: &str) -> Option<&str> {
        self.by_user.get(user).map(String::as_str)
    }

    pub fn user(&self, email: &str) -> Option<&UserId> {
        self.by_email.get(&email.to_lowercase())
    }
}

/// Build a synthetic address for users without a linked calendar account.
pub fn synthetic_email(display_name: &str, fallback: &str, domain: &str) -> String {
    let local: String = display_name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '.' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let local = local.trim_matches('.');
    if local.is_empty() {
        format!("{fallback}@{domain}")
    } else {
        format!("{local}@{domain}")
    }
}

/// What one merge cycle decided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Full reconciled attendee list.
    pub attendees: Vec<Attendee>,
    /// Whether `attendees` must be written to the calendar.
    pub dirty: bool,
    /// Identities removed from `changed` this cycle; restored if the write
    /// fails.
    pub reconciled: BTreeSet<UserId>,
    /// Number of calendar-origin responses copied into the record.
    pub external: usize,
}

/// Reconcile `record` against the calendar's `attendees`.
///
/// Mutates the record's response sets for calendar-origin changes and clears
/// reconciled identities from `changed`. Identities the directory cannot map
/// are left untouched.
pub fn merge_attendance(
    record: &mut RsvpRecord,
    attendees: &[Attendee],
    directory: &EmailDirectory,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut seen = BTreeSet::new();

    for attendee in attendees {
        let Some(user) = directory.user(&attendee.email).cloned() else {
            outcome.attendees.push(attendee.clone());
            continue;
        };
        seen.insert(user.clone());

        if record.changed.contains(&user) {
            if record.invited.contains(&user) {
                let mut updated = attendee.clone();
                updated.response_status = record.implied_status(&user);
                outcome.attendees.push(updated);
            }
            outcome.dirty = true;
        } else {
            let status = attendee.response_status.normalized();
            if status != record.implied_status(&user) {
                record.apply_external_status(&user, status);
                outcome.external += 1;
            }
            outcome.attendees.push(attendee.clone());
        }

        if record.changed.remove(&user) {
            outcome.reconciled.insert(user);
        }
    }

    let missing: Vec<UserId> =
        record.invited.iter().filter(|user| !seen.contains(*user)).cloned().collect();
    for user in missing {
        let Some(email) = directory.email(&user) else {
            continue;
        };
        outcome.attendees.push(Attendee::new(email, record.implied_status(&user)));
        outcome.dirty = true;
        if record.changed.remove(&user) {
            outcome.reconciled.insert(user);
        }
    }

    // Uninvited identities that never reached the calendar have nothing left
    // to write.
    let stale: Vec<UserId> = record
        .changed
        .iter()
        .filter(|user| !record.invited.contains(*user) && !seen.contains(*user))
        .cloned()
        .collect();
    for user in stale {
        record.changed.remove(&user);
        outcome.reconciled.insert(user);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fluffer_domain::{Response, ResponseStatus};

    use super::*;

    fn directory() -> EmailDirectory {
        let mut dir = EmailDirectory::default();
        dir.insert("a", "a@example.com");
        dir.insert("b", "b@example.com");
        dir.insert("c", "C@Example.com");
        dir
    }

    fn record() -> RsvpRecord {
        RsvpRecord::new("e", Utc::now())
    }

    fn status_of<'a>(attendees: &'a [Attendee], email: &str) -> Option<&'a ResponseStatus> {
        attendees.iter().find(|a| a.email == email).map(|a| &a.response_status)
    }

    #[test]
    fn appends_missing_invitees_with_implied_status() {
        let mut r = record();
        r.invite_user("a");
        r.invite_user("b");
        r.change_response("a", Response::Yes);

        let outcome = merge_attendance(&mut r, &[], &directory());
        assert!(outcome.dirty);
        assert_eq!(status_of(&outcome.attendees, "a@example.com"), Some(&ResponseStatus::Accepted));
        assert_eq!(
            status_of(&outcome.attendees, "b@example.com"),
            Some(&ResponseStatus::NeedsAction)
        );
        assert!(r.changed.is_empty());
        assert_eq!(outcome.reconciled.len(), 2);
    }

    #[test]
    fn local_change_overwrites_calendar() {
        let mut r = record();
        r.change_response("a", Response::No);
        let attendees = vec![Attendee::new("a@example.com", ResponseStatus::Accepted)];

        let outcome = merge_attendance(&mut r, &attendees, &directory());
        assert!(outcome.dirty);
        assert_eq!(status_of(&outcome.attendees, "a@example.com"), Some(&ResponseStatus::Declined));
        assert!(r.no.contains("a"));
        assert_eq!(outcome.external, 0);
    }

    #[test]
    fn calendar_change_is_applied_locally_without_write() {
        let mut r = record();
        r.invite_user("a");
        r.changed.clear();
        let attendees = vec![Attendee::new("A@EXAMPLE.com", ResponseStatus::Declined)];

        let outcome = merge_attendance(&mut r, &attendees, &directory());
        assert!(!outcome.dirty);
        assert!(r.no.contains("a"));
        assert_eq!(outcome.external, 1);
        assert_eq!(outcome.attendees, attendees);
    }

    #[test]
    fn tentative_matches_no_response() {
        let mut r = record();
        r.invite_user("a");
        r.changed.clear();
        let attendees = vec![Attendee::new("a@example.com", ResponseStatus::Tentative)];

        let outcome = merge_attendance(&mut r, &attendees, &directory());
        assert!(!outcome.dirty);
        assert_eq!(outcome.external, 0);
    }

    #[test]
    fn uninvited_identity_is_dropped_from_attendees() {
        let mut r = record();
        r.change_response("a", Response::Yes);
        r.changed.clear();
        r.change_response("a", Response::Uninvite);
        let attendees = vec![
            Attendee::new("a@example.com", ResponseStatus::Accepted),
            Attendee::new("stranger@example.com", ResponseStatus::Accepted),
        ];

        let outcome = merge_attendance(&mut r, &attendees, &directory());
        assert!(outcome.dirty);
        assert_eq!(outcome.attendees.len(), 1);
        assert_eq!(outcome.attendees[0].email, "stranger@example.com");
        assert!(r.changed.is_empty());
    }

    #[test]
    fn uninvited_identity_without_attendee_just_clears_marker() {
        let mut r = record();
        r.change_response("a", Response::Yes);
        r.change_response("a", Response::Uninvite);

        let outcome = merge_attendance(&mut r, &[], &directory());
        assert!(!outcome.dirty);
        assert!(r.changed.is_empty());
    }

    #[test]
    fn second_cycle_after_write_is_quiet() {
        let mut r = record();
        r.invite_user("a");
        r.invite_user("b");
        r.change_response("a", Response::Yes);

        let first = merge_attendance(&mut r, &[], &directory());
        let before = r.clone();
        let second = merge_attendance(&mut r, &first.attendees, &directory());

        assert!(!second.dirty);
        assert_eq!(second.external, 0);
        assert_eq!(r, before);
    }

    #[test]
    fn unmapped_invitee_is_not_appended() {
        let mut r = record();
        r.invite_user("ghost");
        let outcome = merge_attendance(&mut r, &[], &directory());
        assert!(outcome.attendees.is_empty());
        assert!(r.changed.contains("ghost"));
    }

    #[test]
    fn synthetic_email_sanitizes_display_name() {
        assert_eq!(synthetic_email("Jane Doe!", "1", "discord.invalid"), "jane.doe@discord.invalid");
        assert_eq!(synthetic_email("  ", "42", "discord.invalid"), "42@discord.invalid");
        assert_eq!(synthetic_email("Zoë", "7", "x.test"), "zo@x.test");
    }
}
