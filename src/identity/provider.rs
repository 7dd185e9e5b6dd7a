//! Identity and membership collaborator
//!
//! Sessions, registration and profiles live outside this service; the core
//! only needs to turn a session token into a member and ask which clubs that
//! member belongs to and in what role.

use crate::error::{MatchmakingError, Result};
use crate::types::{ClubId, ClubRole, MemberId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Trait for the user/session directory
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token to a member (`Unauthorized` when unknown)
    async fn authenticate(&self, session_token: &str) -> Result<MemberId>;

    /// All clubs the member belongs to, in any role
    async fn clubs_of(&self, member: &MemberId) -> Result<BTreeSet<ClubId>>;

    /// The member's role in one club
    async fn role_of(&self, member: &MemberId, club_id: ClubId) -> Result<ClubRole>;
}

/// Identity directory held in memory
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    sessions: RwLock<HashMap<String, MemberId>>,
    memberships: RwLock<HashMap<MemberId, HashMap<ClubId, ClubRole>>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session token for a member
    pub fn add_session(&self, token: impl Into<String>, member: impl Into<MemberId>) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(token.into(), member.into());
        }
    }

    pub fn revoke_session(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(token);
        }
    }

    /// Record that a member belongs to a club with the given role
    pub fn add_membership(&self, member: impl Into<MemberId>, club_id: ClubId, role: ClubRole) {
        if let Ok(mut memberships) = self.memberships.write() {
            memberships
                .entry(member.into())
                .or_default()
                .insert(club_id, role);
        }
    }

    fn lock_error() -> MatchmakingError {
        MatchmakingError::InternalError {
            message: "Failed to acquire identity lock".to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn authenticate(&self, session_token: &str) -> Result<MemberId> {
        let sessions = self.sessions.read().map_err(|_| Self::lock_error())?;
        match sessions.get(session_token) {
            Some(member) => {
                debug!("Authenticated member {}", member);
                Ok(member.clone())
            }
            None => {
                warn!("Rejected unknown session token");
                Err(MatchmakingError::unauthorized("Invalid or expired session"))
            }
        }
    }

    async fn clubs_of(&self, member: &MemberId) -> Result<BTreeSet<ClubId>> {
        let memberships = self.memberships.read().map_err(|_| Self::lock_error())?;
        Ok(memberships
            .get(member)
            .map(|clubs| {
                clubs
                    .iter()
                    .filter(|(_, role)| **role != ClubRole::None)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn role_of(&self, member: &MemberId, club_id: ClubId) -> Result<ClubRole> {
        let memberships = self.memberships.read().map_err(|_| Self::lock_error())?;
        Ok(memberships
            .get(member)
            .and_then(|clubs| clubs.get(&club_id).copied())
            .unwrap_or(ClubRole::None))
    }
}
