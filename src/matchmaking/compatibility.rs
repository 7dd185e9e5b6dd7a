//! Request validation and the compatibility rules used to search the queue

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::store::MatchCriteria;
use crate::types::{
    Club, DayPreference, MatchRequest, QueueEntry, QueueStatus, Region, TimePreference,
};
use crate::utils::{current_timestamp, generate_entry_id};

/// A match request after validation and preference normalization
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub sport: String,
    pub region: Region,
    pub day_preference: DayPreference,
    pub time_preference: TimePreference,
    pub connection_handle: Option<String>,
}

impl NormalizedRequest {
    /// Validate required fields and normalize preference tokens.
    ///
    /// Unknown or missing day/time tokens become `Any`; they are never an error.
    pub fn from_request(request: &MatchRequest) -> Result<Self> {
        let sport = request.sport.trim();
        if sport.is_empty() {
            return Err(MatchmakingError::invalid("Sport cannot be empty"));
        }

        let primary = request.region.primary.trim();
        if primary.is_empty() {
            return Err(MatchmakingError::invalid("Region cannot be empty"));
        }
        let secondary = request
            .region
            .secondary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        Ok(Self {
            sport: sport.to_string(),
            region: Region::new(primary, secondary),
            day_preference: DayPreference::from_token(request.day_pref.as_deref()),
            time_preference: TimePreference::from_token(request.time_pref.as_deref()),
            connection_handle: request.connection_handle.clone(),
        })
    }

    /// Search criteria for a requesting club
    pub fn criteria(&self, club: &Club, settings: &MatchmakingSettings) -> MatchCriteria {
        MatchCriteria {
            sport: self.sport.clone(),
            region: self.region.clone(),
            granularity: settings.region_granularity,
            requesting_club: club.id,
            rating: club.rating,
            rating_band: settings.rating_band,
            day_preference: self.day_preference,
            time_preference: self.time_preference,
        }
    }

    /// A fresh WAITING entry carrying the club's current rating
    pub fn queue_entry(&self, club: &Club) -> QueueEntry {
        QueueEntry {
            id: generate_entry_id(),
            club_id: club.id,
            sport: self.sport.clone(),
            region: self.region.clone(),
            rating: club.rating,
            day_preference: self.day_preference,
            time_preference: self.time_preference,
            status: QueueStatus::Waiting,
            connection_handle: self.connection_handle.clone(),
            room_id: None,
            created_at: current_timestamp(),
        }
    }
}
