//! Caller-relative projections of match records
//!
//! Matches are stored once, keyed by club. Every view here is oriented to one
//! club at read time: "my" score is the score stored under that club's id.

use crate::types::{
    Club, ClubId, GameResult, Match, MatchStatus, MemberId, RatingChange, RoomId, Schedule,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shared schedule as shown to either side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub when: DateTime<Utc>,
    pub location: String,
}

impl From<&Schedule> for ScheduleView {
    fn from(schedule: &Schedule) -> Self {
        Self {
            when: schedule.when,
            location: schedule.location.clone(),
        }
    }
}

/// One match seen from one club
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    pub room_id: RoomId,
    pub status: MatchStatus,
    pub is_proposer: bool,
    pub my_club_id: ClubId,
    pub my_score: Option<u32>,
    pub op_score: Option<u32>,
    pub opponent_club_id: ClubId,
    pub opponent_name: String,
    pub schedule: Option<ScheduleView>,
}

impl MatchDetail {
    pub fn oriented(record: &Match, my_club: ClubId, caller: &MemberId, opponent_name: String) -> Self {
        let (my_score, op_score) = record.scores_for(my_club);
        let is_proposer = record
            .proposal
            .as_ref()
            .map_or(false, |proposal| &proposal.proposer_member == caller);

        Self {
            room_id: record.room_id.clone(),
            status: record.status,
            is_proposer,
            my_club_id: my_club,
            my_score,
            op_score,
            opponent_club_id: record.opponent_of(my_club).unwrap_or_default(),
            opponent_name,
            schedule: record.schedule.as_ref().map(ScheduleView::from),
        }
    }
}

/// Row of the caller's match list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub room_id: RoomId,
    pub status: MatchStatus,
    pub my_club_id: ClubId,
    pub opponent_club_id: ClubId,
    pub opponent_name: String,
    pub sport: String,
    pub region: String,
    pub created_at: DateTime<Utc>,
}

/// A settled match in a club's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedMatch {
    pub room_id: RoomId,
    pub opponent_club_id: ClubId,
    pub opponent_name: String,
    pub my_score: Option<u32>,
    pub op_score: Option<u32>,
    pub result: Option<GameResult>,
    pub rating_change: Option<i32>,
    pub played_at: DateTime<Utc>,
}

impl FinishedMatch {
    pub fn oriented(record: &Match, my_club: ClubId, opponent_name: String) -> Self {
        let (my_score, op_score) = record.scores_for(my_club);
        let mine = record
            .rating_changes
            .iter()
            .find(|change| change.club_id == my_club);

        Self {
            room_id: record.room_id.clone(),
            opponent_club_id: record.opponent_of(my_club).unwrap_or_default(),
            opponent_name,
            my_score,
            op_score,
            result: mine.map(|change| change.result),
            rating_change: mine.map(RatingChange::delta),
            played_at: record.played_at(),
        }
    }
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub rank: u32,
    pub club_id: ClubId,
    pub name: String,
    pub region: String,
    pub rating: i32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

/// Competition ranking ("1224"): ties share a rank and the next rank skips.
///
/// `clubs` must already be ordered by rating, highest first.
pub fn rank_clubs(clubs: Vec<Club>) -> Vec<RankingEntry> {
    let mut entries = Vec::with_capacity(clubs.len());
    let mut previous: Option<(i32, u32)> = None;

    for (index, club) in clubs.into_iter().enumerate() {
        let rank = match previous {
            Some((rating, rank)) if rating == club.rating => rank,
            _ => index as u32 + 1,
        };
        previous = Some((club.rating, rank));

        entries.push(RankingEntry {
            rank,
            club_id: club.id,
            name: club.name,
            region: club.region.to_string(),
            rating: club.rating,
            wins: club.wins,
            draws: club.draws,
            losses: club.losses,
        });
    }
    entries
}

/// Outcome of a confirm-or-reject call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationOutcome {
    pub room_id: RoomId,
    pub status: MatchStatus,
    /// True when the match had already been settled and nothing changed
    pub already_finished: bool,
    pub rating_changes: Vec<RatingChange>,
}

impl ConfirmationOutcome {
    pub fn from_match(record: &Match, already_finished: bool) -> Self {
        Self {
            room_id: record.room_id.clone(),
            status: record.status,
            already_finished,
            rating_changes: record.rating_changes.clone(),
        }
    }
}

/// Club names for a set of ids, falling back to an empty name
pub fn name_of(clubs: &HashMap<ClubId, Club>, club_id: ClubId) -> String {
    clubs
        .get(&club_id)
        .map(|club| club.name.clone())
        .unwrap_or_default()
}
