//! Elo rating model
//!
//! Thin wrapper over the skillratings Elo implementation that works in the
//! integer ratings clubs carry and rounds every new rating half away from zero.

use crate::error::{MatchmakingError, Result};
use crate::rating::calculator::{RatingCalculator, RatingUpdate};
use crate::types::GameResult;
use serde::{Deserialize, Serialize};
use skillratings::elo::{elo, EloConfig, EloRating};
use skillratings::Outcomes;

pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Probability-like expectation that `rating_a` beats `rating_b`, in (0, 1)
pub fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    let (expected_a, _) = skillratings::elo::expected_score(
        &EloRating {
            rating: rating_a as f64,
        },
        &EloRating {
            rating: rating_b as f64,
        },
    );
    expected_a
}

/// Apply one game result to both ratings.
///
/// `actual_score_a` must be 1.0 (a won), 0.5 (draw) or 0.0 (a lost); b receives
/// the complement. Each new rating is `old + k * (actual - expected)` rounded
/// half away from zero.
pub fn apply_result(rating_a: i32, rating_b: i32, actual_score_a: f64, k: f64) -> Result<(i32, i32)> {
    let outcome = outcome_for(actual_score_a)?;
    if !(k.is_finite() && k > 0.0) {
        return Err(MatchmakingError::invalid(format!(
            "K-factor must be positive, got {}",
            k
        )));
    }

    let (new_a, new_b) = elo(
        &EloRating {
            rating: rating_a as f64,
        },
        &EloRating {
            rating: rating_b as f64,
        },
        &outcome,
        &EloConfig { k },
    );

    Ok((new_a.rating.round() as i32, new_b.rating.round() as i32))
}

fn outcome_for(actual_score: f64) -> Result<Outcomes> {
    if actual_score == 1.0 {
        Ok(Outcomes::WIN)
    } else if actual_score == 0.5 {
        Ok(Outcomes::DRAW)
    } else if actual_score == 0.0 {
        Ok(Outcomes::LOSS)
    } else {
        Err(MatchmakingError::invalid(format!(
            "Actual score must be 0, 0.5 or 1, got {}",
            actual_score
        )))
    }
}

/// Elo parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloSettings {
    pub k_factor: f64,
    pub initial_rating: i32,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
            initial_rating: super::DEFAULT_RATING,
        }
    }
}

impl From<&crate::config::RatingConfig> for EloSettings {
    fn from(config: &crate::config::RatingConfig) -> Self {
        Self {
            k_factor: config.k_factor,
            initial_rating: config.initial_rating,
        }
    }
}

impl EloSettings {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.k_factor.is_finite() && self.k_factor > 0.0) {
            return Err(MatchmakingError::ConfigurationError {
                message: "K-factor must be positive".to_string(),
            });
        }

        if self.initial_rating < 0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "Initial rating cannot be negative".to_string(),
            });
        }

        Ok(())
    }
}

/// Elo rating calculator for two-club matches
#[derive(Debug, Clone)]
pub struct EloRatingCalculator {
    settings: EloSettings,
}

impl EloRatingCalculator {
    pub fn new(settings: EloSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &EloSettings {
        &self.settings
    }
}

impl Default for EloRatingCalculator {
    fn default() -> Self {
        Self {
            settings: EloSettings::default(),
        }
    }
}

impl RatingCalculator for EloRatingCalculator {
    fn calculate(&self, home_rating: i32, away_rating: i32, home_result: GameResult) -> Result<RatingUpdate> {
        let (home_new, away_new) = apply_result(
            home_rating,
            away_rating,
            home_result.actual_score(),
            self.settings.k_factor,
        )?;

        Ok(RatingUpdate {
            home_old: home_rating,
            home_new,
            away_old: away_rating,
            away_new,
        })
    }

    fn initial_rating(&self) -> i32 {
        self.settings.initial_rating
    }

    fn config(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "elo",
            "k_factor": self.settings.k_factor,
            "initial_rating": self.settings.initial_rating
        })
    }
}
