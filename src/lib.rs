//! Matchday - amateur club matchmaking service
//!
//! Pairs sports clubs that want a friendly match, walks each match through
//! scheduling and two-sided result confirmation, and keeps Elo ratings and a
//! regional leaderboard. Notifications go out over AMQP or the log.

pub mod amqp;
pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod matchmaking;
pub mod metrics;
pub mod notify;
pub mod rating;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ErrorKind, MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use identity::IdentityProvider;
pub use lifecycle::MatchLifecycle;
pub use matchmaking::Matchmaker;
pub use notify::{NotificationDispatcher, NotificationGateway};
pub use store::{InMemoryMatchStore, MatchQueueStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
