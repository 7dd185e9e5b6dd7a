//! Rating calculator trait and implementations
//!
//! This module defines the interface the match lifecycle uses to settle a
//! confirmed result, plus a recording mock for tests.

use crate::error::Result;
use crate::types::{ClubId, GameResult, RatingChange};
use serde::{Deserialize, Serialize};

/// New ratings for both sides of a settled match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub home_old: i32,
    pub home_new: i32,
    pub away_old: i32,
    pub away_new: i32,
}

impl RatingUpdate {
    pub fn home_delta(&self) -> i32 {
        self.home_new - self.home_old
    }

    pub fn away_delta(&self) -> i32 {
        self.away_new - self.away_old
    }

    /// Rating changes for both clubs, home first
    pub fn into_changes(self, home: ClubId, away: ClubId, home_result: GameResult) -> Vec<RatingChange> {
        vec![
            RatingChange {
                club_id: home,
                old_rating: self.home_old,
                new_rating: self.home_new,
                result: home_result,
            },
            RatingChange {
                club_id: away,
                old_rating: self.away_old,
                new_rating: self.away_new,
                result: home_result.reversed(),
            },
        ]
    }
}

/// Trait for calculating rating changes after a two-club game
pub trait RatingCalculator: Send + Sync {
    /// Calculate new ratings from the home club's point of view
    fn calculate(&self, home_rating: i32, away_rating: i32, home_result: GameResult) -> Result<RatingUpdate>;

    /// Rating for newly registered clubs
    fn initial_rating(&self) -> i32;

    /// Get current configuration as JSON
    fn config(&self) -> serde_json::Value;
}

/// Mock rating calculator for testing
#[derive(Debug, Default)]
pub struct MockRatingCalculator {
    calculation_calls: std::sync::Mutex<Vec<(i32, i32, GameResult)>>,
    fixed_delta: std::sync::RwLock<Option<i32>>,
}

impl MockRatingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move every rating by a fixed amount: home gains, away loses (or the reverse on a loss)
    pub fn set_fixed_delta(&self, delta: i32) {
        if let Ok(mut fixed) = self.fixed_delta.write() {
            *fixed = Some(delta);
        }
    }

    /// Get all calculation calls made (for testing)
    pub fn get_calculation_calls(&self) -> Vec<(i32, i32, GameResult)> {
        self.calculation_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl RatingCalculator for MockRatingCalculator {
    fn calculate(&self, home_rating: i32, away_rating: i32, home_result: GameResult) -> Result<RatingUpdate> {
        if let Ok(mut calls) = self.calculation_calls.lock() {
            calls.push((home_rating, away_rating, home_result));
        }

        let delta = self
            .fixed_delta
            .read()
            .ok()
            .and_then(|fixed| *fixed)
            .unwrap_or(0);
        let signed = match home_result {
            GameResult::Win => delta,
            GameResult::Draw => 0,
            GameResult::Loss => -delta,
        };

        Ok(RatingUpdate {
            home_old: home_rating,
            home_new: home_rating + signed,
            away_old: away_rating,
            away_new: away_rating - signed,
        })
    }

    fn initial_rating(&self) -> i32 {
        super::DEFAULT_RATING
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({ "type": "mock" })
    }
}
