//! Startup data for the in-memory store and identity directory
//!
//! ```toml
//! [[clubs]]
//! id = 1
//! name = "Alpha FC"
//! sport = "soccer"
//! region = "Seoul/Gangnam"
//!
//! [[members]]
//! id = "alice"
//! session_token = "token-alice"
//! clubs = [{ club_id = 1, role = "ADMIN" }]
//! ```

use crate::identity::InMemoryIdentityProvider;
use crate::store::MatchQueueStore;
use crate::types::{Club, ClubId, ClubRole, Region};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub clubs: Vec<SeedClub>,
    #[serde(default)]
    pub members: Vec<SeedMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedClub {
    pub id: ClubId,
    pub name: String,
    pub sport: String,
    /// `"Primary/Secondary"` or `"Primary"`
    pub region: String,
    pub rating: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedMember {
    pub id: String,
    pub session_token: Option<String>,
    #[serde(default)]
    pub clubs: Vec<SeedMembership>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedMembership {
    pub club_id: ClubId,
    pub role: String,
}

impl SeedData {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse seed data")
    }

    /// Load clubs into the store and sessions/memberships into the directory
    pub async fn apply(
        &self,
        store: &dyn MatchQueueStore,
        identity: &InMemoryIdentityProvider,
        initial_rating: i32,
    ) -> Result<()> {
        for seed in &self.clubs {
            let region = Region::parse(&seed.region)
                .with_context(|| format!("Invalid region for club {}", seed.id))?;
            let club = Club::new(seed.id, seed.name.clone(), seed.sport.clone(), region)
                .with_rating(seed.rating.unwrap_or(initial_rating));
            store
                .upsert_club(club)
                .await
                .with_context(|| format!("Failed to seed club {}", seed.id))?;
        }

        for member in &self.members {
            if let Some(token) = &member.session_token {
                identity.add_session(token.clone(), member.id.clone());
            }
            for membership in &member.clubs {
                identity.add_membership(
                    member.id.clone(),
                    membership.club_id,
                    ClubRole::from_token(&membership.role),
                );
            }
        }

        info!(
            "Seeded {} clubs and {} members",
            self.clubs.len(),
            self.members.len()
        );
        Ok(())
    }
}
