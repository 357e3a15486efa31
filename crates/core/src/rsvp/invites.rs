//! Invite computation from group membership.

use fluffer_domain::{Result, RsvpRecord};
use tracing::{info, warn};

use super::ports::NotificationSurface;

/// Add every current member of the record's invite group to `invited` and
/// `changed`.
///
/// Returns whether anyone was added. Unknown groups are a warning and leave
/// existing invitees in place.
pub async fn refresh_invites(
    record: &mut RsvpRecord,
    surface: &dyn NotificationSurface,
) -> Result<bool> {
    let Some(invite) = record.invite.clone() else {
        return Ok(false);
    };

    let Some(group) = surface.resolve_group(&invite).await? else {
        warn!(event_id = %record.event_id, group = %invite, "Unknown invite group");
        return Ok(false);
    };

    let mut added = 0usize;
    for member in &group.members {
        if record.invite_user(member) {
            added += 1;
        }
    }

    if added > 0 {
        record.posted = true;
        info!(event_id = %record.event_id, group = %invite, added, "Invited group members");
    }
    Ok(added > 0)
}
