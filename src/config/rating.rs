//! Rating system configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Elo parameters as loaded from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Elo K-factor applied to every confirmed result
    pub k_factor: f64,
    /// Rating assigned to newly registered clubs
    pub initial_rating: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            initial_rating: 1000,
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.k_factor.is_finite() && self.k_factor > 0.0) {
            return Err(anyhow!("K-factor must be positive, got {}", self.k_factor));
        }
        if self.initial_rating < 0 {
            return Err(anyhow!("Initial rating cannot be negative"));
        }
        Ok(())
    }
}
