//! Common types used throughout the matchmaking service

use crate::error::{MatchmakingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for clubs
pub type ClubId = u64;

/// Stable identity of a platform member
pub type MemberId = String;

/// Opaque identifier of a paired match
pub type RoomId = String;

/// Unique identifier for queue entries
pub type EntryId = Uuid;

/// Two-level administrative area used to localize matchmaking
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub primary: String,
    #[serde(default)]
    pub secondary: Option<String>,
}

impl Region {
    pub fn new(primary: impl Into<String>, secondary: Option<&str>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.map(str::to_string),
        }
    }

    /// Parse `"Primary/Secondary"` or `"Primary"`
    pub fn parse(value: &str) -> Result<Self> {
        let mut parts = value.splitn(2, '/');
        let primary = parts.next().unwrap_or_default().trim();
        if primary.is_empty() {
            return Err(MatchmakingError::invalid("Region cannot be empty"));
        }
        let secondary = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            primary: primary.to_string(),
            secondary,
        })
    }

    /// Whether two regions match at the given granularity
    pub fn matches(&self, other: &Region, granularity: RegionGranularity) -> bool {
        match granularity {
            RegionGranularity::Primary => self.primary == other.primary,
            RegionGranularity::PrimaryAndSecondary => {
                self.primary == other.primary && self.secondary == other.secondary
            }
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(f, "{}/{}", self.primary, secondary),
            None => write!(f, "{}", self.primary),
        }
    }
}

/// How precisely regions must agree for two clubs to be paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionGranularity {
    Primary,
    PrimaryAndSecondary,
}

impl std::str::FromStr for RegionGranularity {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(RegionGranularity::Primary),
            "primary_and_secondary" => Ok(RegionGranularity::PrimaryAndSecondary),
            other => Err(MatchmakingError::invalid(format!(
                "Unknown region granularity: {}",
                other
            ))),
        }
    }
}

/// Preferred days for playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayPreference {
    Weekday,
    Weekend,
    Any,
}

impl DayPreference {
    /// Lenient parse: unknown or missing tokens fall back to `Any`
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(|t| t.trim().to_uppercase()).as_deref() {
            Some("WEEKDAY") => DayPreference::Weekday,
            Some("WEEKEND") => DayPreference::Weekend,
            _ => DayPreference::Any,
        }
    }

    pub fn is_compatible_with(&self, other: DayPreference) -> bool {
        *self == DayPreference::Any || other == DayPreference::Any || *self == other
    }
}

/// Preferred time of day for playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimePreference {
    Morning,
    Afternoon,
    Evening,
    Any,
}

impl TimePreference {
    /// Lenient parse: unknown or missing tokens fall back to `Any`
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(|t| t.trim().to_uppercase()).as_deref() {
            Some("MORNING") => TimePreference::Morning,
            Some("AFTERNOON") => TimePreference::Afternoon,
            Some("EVENING") => TimePreference::Evening,
            _ => TimePreference::Any,
        }
    }

    pub fn is_compatible_with(&self, other: TimePreference) -> bool {
        *self == TimePreference::Any || other == TimePreference::Any || *self == other
    }
}

/// Role of a member inside a club
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClubRole {
    Admin,
    Member,
    None,
}

impl ClubRole {
    /// Case-insensitive parse of role tokens as stored by the member directory
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_uppercase().as_str() {
            "ADMIN" => ClubRole::Admin,
            "MEMBER" => ClubRole::Member,
            _ => ClubRole::None,
        }
    }
}

/// A club as known to the club directory, with its competitive standing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
    pub sport: String,
    pub region: Region,
    pub rating: i32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl Club {
    pub fn new(id: ClubId, name: impl Into<String>, sport: impl Into<String>, region: Region) -> Self {
        Self {
            id,
            name: name.into(),
            sport: sport.into(),
            region,
            rating: crate::rating::DEFAULT_RATING,
            wins: 0,
            draws: 0,
            losses: 0,
        }
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = rating;
        self
    }

    /// Apply a settled result to this club's record
    pub fn record_result(&mut self, new_rating: i32, result: GameResult) {
        self.rating = new_rating;
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Draw => self.draws += 1,
            GameResult::Loss => self.losses += 1,
        }
    }
}

/// Status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Waiting,
    Matched,
}

/// A club's pending request for an opponent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub club_id: ClubId,
    pub sport: String,
    pub region: Region,
    /// Rating snapshot taken at enqueue time
    pub rating: i32,
    pub day_preference: DayPreference,
    pub time_preference: TimePreference,
    pub status: QueueStatus,
    /// Live connection handle for realtime delivery, if the client has one
    pub connection_handle: Option<String>,
    pub room_id: Option<RoomId>,
    pub created_at: DateTime<Utc>,
}

/// Status of a paired match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    Pending,
    Finished,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "MATCHED"),
            MatchStatus::Pending => write!(f, "PENDING"),
            MatchStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Outcome of a game from one club's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameResult {
    Win,
    Draw,
    Loss,
}

impl GameResult {
    pub fn from_scores(my_score: u32, op_score: u32) -> Self {
        match my_score.cmp(&op_score) {
            std::cmp::Ordering::Greater => GameResult::Win,
            std::cmp::Ordering::Equal => GameResult::Draw,
            std::cmp::Ordering::Less => GameResult::Loss,
        }
    }

    /// Elo actual score: 1.0 win, 0.5 draw, 0.0 loss
    pub fn actual_score(&self) -> f64 {
        match self {
            GameResult::Win => 1.0,
            GameResult::Draw => 0.5,
            GameResult::Loss => 0.0,
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            GameResult::Win => GameResult::Loss,
            GameResult::Draw => GameResult::Draw,
            GameResult::Loss => GameResult::Win,
        }
    }
}

/// Scores of both clubs, keyed by club id rather than by side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSheet {
    scores: BTreeMap<ClubId, u32>,
}

impl ScoreSheet {
    pub fn new(my_club: ClubId, my_score: u32, op_club: ClubId, op_score: u32) -> Self {
        let mut scores = BTreeMap::new();
        scores.insert(my_club, my_score);
        scores.insert(op_club, op_score);
        Self { scores }
    }

    pub fn score_of(&self, club_id: ClubId) -> Option<u32> {
        self.scores.get(&club_id).copied()
    }
}

/// The most recent score pair awaiting the other side's confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultProposal {
    pub scores: ScoreSheet,
    pub proposer_club: ClubId,
    pub proposer_member: MemberId,
    pub proposed_at: DateTime<Utc>,
}

/// Agreed time and place of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub when: DateTime<Utc>,
    pub location: String,
}

/// Rating change applied to one club
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingChange {
    pub club_id: ClubId,
    pub old_rating: i32,
    pub new_rating: i32,
    pub result: GameResult,
}

impl RatingChange {
    pub fn delta(&self) -> i32 {
        self.new_rating - self.old_rating
    }
}

/// One canonical record per paired match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub room_id: RoomId,
    /// The side that was waiting in the queue
    pub home_club: ClubId,
    /// The side whose request found the waiting entry
    pub away_club: ClubId,
    pub sport: String,
    pub region: Region,
    pub status: MatchStatus,
    pub proposal: Option<ResultProposal>,
    pub schedule: Option<Schedule>,
    pub rating_changes: Vec<RatingChange>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Match {
    pub fn involves(&self, club_id: ClubId) -> bool {
        self.home_club == club_id || self.away_club == club_id
    }

    pub fn opponent_of(&self, club_id: ClubId) -> Option<ClubId> {
        if club_id == self.home_club {
            Some(self.away_club)
        } else if club_id == self.away_club {
            Some(self.home_club)
        } else {
            None
        }
    }

    /// Scores oriented to `club_id`: (mine, opponent's)
    pub fn scores_for(&self, club_id: ClubId) -> (Option<u32>, Option<u32>) {
        match (&self.proposal, self.opponent_of(club_id)) {
            (Some(proposal), Some(opponent)) => (
                proposal.scores.score_of(club_id),
                proposal.scores.score_of(opponent),
            ),
            _ => (None, None),
        }
    }

    /// The date a match is considered played: schedule if set, else creation
    pub fn played_at(&self) -> DateTime<Utc> {
        self.schedule
            .as_ref()
            .map(|s| s.when)
            .unwrap_or(self.created_at)
    }
}

/// Request from a club admin to find an opponent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    pub club_id: ClubId,
    pub sport: String,
    #[serde(deserialize_with = "region_from_token_or_parts")]
    pub region: Region,
    #[serde(default)]
    pub day_pref: Option<String>,
    #[serde(default)]
    pub time_pref: Option<String>,
    #[serde(default)]
    pub connection_handle: Option<String>,
}

/// Accepts `"Seoul/Gangnam"` as well as `{"primary": .., "secondary": ..}`
fn region_from_token_or_parts<'de, D>(deserializer: D) -> std::result::Result<Region, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RegionForm {
        Token(String),
        Parts {
            primary: String,
            #[serde(default)]
            secondary: Option<String>,
        },
    }

    match RegionForm::deserialize(deserializer)? {
        RegionForm::Token(value) => Region::parse(&value).map_err(serde::de::Error::custom),
        RegionForm::Parts { primary, secondary } => Ok(Region { primary, secondary }),
    }
}

/// Result of a match request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchOutcome {
    #[serde(rename_all = "camelCase")]
    Waiting { entry_id: EntryId },
    #[serde(rename_all = "camelCase")]
    Matched {
        room_id: RoomId,
        opponent_club_id: ClubId,
    },
}
