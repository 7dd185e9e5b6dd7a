//! Repository interface for queue entries, matches and club standings
//!
//! Every operation on [`MatchQueueStore`] is one atomic transaction. Status
//! transitions are guarded inside the store (compare-and-swap on the queue
//! entry status, version and rating guards on settlement) so callers never
//! need an in-process lock around matchmaking.

use crate::error::Result;
use crate::rating::RatingUpdate;
use crate::types::{
    Club, ClubId, DayPreference, EntryId, GameResult, Match, QueueEntry, Region,
    RegionGranularity, ResultProposal, RoomId, Schedule, TimePreference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a requesting club is looking for
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub sport: String,
    pub region: Region,
    pub granularity: RegionGranularity,
    pub requesting_club: ClubId,
    pub rating: i32,
    pub rating_band: i32,
    pub day_preference: DayPreference,
    pub time_preference: TimePreference,
}

impl MatchCriteria {
    /// Whether a waiting entry satisfies these criteria
    pub fn accepts(&self, entry: &QueueEntry) -> bool {
        entry.club_id != self.requesting_club
            && entry.sport == self.sport
            && entry.region.matches(&self.region, self.granularity)
            && crate::utils::ratings_within_band(entry.rating, self.rating, self.rating_band)
            && entry.day_preference.is_compatible_with(self.day_preference)
            && entry.time_preference.is_compatible_with(self.time_preference)
    }
}

/// The requesting side of a pairing
#[derive(Debug, Clone)]
pub struct PairingRequest {
    pub room_id: RoomId,
    pub club_id: ClubId,
    pub sport: String,
    pub region: Region,
}

/// Atomic write that applies rating changes and finishes a match
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Version of the match the rating computation was based on
    pub expected_version: u64,
    pub home_result: GameResult,
    /// Old values double as the expected current ratings of both clubs
    pub update: RatingUpdate,
    pub finished_at: DateTime<Utc>,
}

/// Result of a settlement attempt
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// Ratings were written and the match is now FINISHED
    Applied(Match),
    /// The match had already been settled; nothing was written
    AlreadyFinished(Match),
}

impl ConfirmOutcome {
    pub fn into_match(self) -> Match {
        match self {
            ConfirmOutcome::Applied(record) | ConfirmOutcome::AlreadyFinished(record) => record,
        }
    }
}

/// Filter for the club leaderboard
#[derive(Debug, Clone)]
pub struct RankingQuery {
    pub sport: String,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub limit: usize,
}

/// Counts for health reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub clubs: usize,
    pub waiting_entries: usize,
    pub active_matches: usize,
    pub pending_matches: usize,
    pub finished_matches: usize,
}

/// Read access to club attributes
#[async_trait]
pub trait ClubDirectory: Send + Sync {
    /// Get a single club (`NotFound` when unknown)
    async fn get_club(&self, club_id: ClubId) -> Result<Club>;

    /// Get several clubs; unknown ids are omitted
    async fn get_clubs(&self, club_ids: &[ClubId]) -> Result<HashMap<ClubId, Club>>;
}

/// Persistence for queue entries, matches and standings
#[async_trait]
pub trait MatchQueueStore: ClubDirectory {
    /// Oldest WAITING entry satisfying the criteria
    async fn find_compatible_waiting(&self, criteria: &MatchCriteria) -> Result<Option<QueueEntry>>;

    /// Flip the waiting entry to MATCHED and create the match, atomically
    async fn reserve_pair(&self, waiting_entry_id: EntryId, request: PairingRequest) -> Result<Match>;

    /// Insert a WAITING entry (`AlreadyWaiting` if the club has one)
    async fn enqueue(&self, entry: QueueEntry) -> Result<QueueEntry>;

    async fn get_queue_entry(&self, entry_id: EntryId) -> Result<QueueEntry>;

    async fn get_match_by_room(&self, room_id: &str) -> Result<Match>;

    /// Matches involving any of the clubs, most recent first
    async fn get_matches_for_clubs(&self, club_ids: &[ClubId]) -> Result<Vec<Match>>;

    async fn update_schedule(&self, room_id: &str, schedule: Schedule) -> Result<Match>;

    async fn propose_result(&self, room_id: &str, proposal: ResultProposal) -> Result<Match>;

    async fn reject_result(&self, room_id: &str) -> Result<Match>;

    async fn confirm_result(&self, room_id: &str, settlement: Settlement) -> Result<ConfirmOutcome>;

    /// Clubs of a sport ordered by rating, highest first
    async fn ranking(&self, query: &RankingQuery) -> Result<Vec<Club>>;

    /// FINISHED matches of a club, most recently played first
    async fn finished_matches(&self, club_id: ClubId, limit: usize) -> Result<Vec<Match>>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Register or replace a club
    async fn upsert_club(&self, club: Club) -> Result<()>;
}
