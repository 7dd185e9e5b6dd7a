//! Authorization checks shared by the matchmaker and the match lifecycle

use crate::error::{MatchmakingError, Result};
use crate::identity::provider::IdentityProvider;
use crate::types::{ClubId, ClubRole, Match, MemberId};
use tracing::warn;

/// Fail unless the member is an admin of the club
pub async fn require_admin(
    identity: &dyn IdentityProvider,
    member: &MemberId,
    club_id: ClubId,
) -> Result<()> {
    match identity.role_of(member, club_id).await? {
        ClubRole::Admin => Ok(()),
        role => {
            warn!(
                "Member {} ({:?}) tried an admin action for club {}",
                member, role, club_id
            );
            Err(MatchmakingError::unauthorized("Only admins can request match"))
        }
    }
}

/// The club a member acts for in a match.
///
/// A member of both clubs acts for the home club.
pub async fn resolve_participant_club(
    identity: &dyn IdentityProvider,
    member: &MemberId,
    record: &Match,
) -> Result<ClubId> {
    let clubs = identity.clubs_of(member).await?;

    if clubs.contains(&record.home_club) {
        Ok(record.home_club)
    } else if clubs.contains(&record.away_club) {
        Ok(record.away_club)
    } else {
        warn!(
            "Member {} is not part of room {}",
            member, record.room_id
        );
        Err(MatchmakingError::unauthorized(format!(
            "Not a participant of room {}",
            record.room_id
        )))
    }
}
