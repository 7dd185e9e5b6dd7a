//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{EntryId, RoomId};

/// Generate a new opaque room identifier (`room_` + random UUID)
pub fn generate_room_id() -> RoomId {
    format!("room_{}", Uuid::new_v4())
}

/// Generate a new unique queue entry ID
pub fn generate_entry_id() -> EntryId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: i32, rating2: i32) -> i32 {
    (rating1 - rating2).abs()
}

/// Check if two ratings are within the given band (inclusive)
pub fn ratings_within_band(rating1: i32, rating2: i32, band: i32) -> bool {
    rating_difference(rating1, rating2) <= band
}
