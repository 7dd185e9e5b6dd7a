//! Club rating system using the Elo model
//!
//! This module provides the pure Elo functions, the calculator seam the match
//! lifecycle settles through, and integration with the skillratings crate.

pub mod calculator;
pub mod elo;

/// Rating of a club that has never played
pub const DEFAULT_RATING: i32 = 1000;

// Re-export commonly used types
pub use calculator::{MockRatingCalculator, RatingCalculator, RatingUpdate};
pub use elo::{apply_result, expected_score, EloRatingCalculator, EloSettings};
