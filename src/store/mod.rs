//! Persistence for the matchmaking core
//!
//! The [`MatchQueueStore`] trait is the only shared mutable resource; its
//! atomicity contract is what makes concurrent pairing and settlement safe.

pub mod memory;
pub mod repository;

pub use memory::InMemoryMatchStore;
pub use repository::{
    ClubDirectory, ConfirmOutcome, MatchCriteria, MatchQueueStore, PairingRequest, RankingQuery,
    Settlement, StoreStats,
};
