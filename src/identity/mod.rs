//! Caller identity, club membership and authorization

pub mod auth;
pub mod provider;

pub use auth::{require_admin, resolve_participant_club};
pub use provider::{IdentityProvider, InMemoryIdentityProvider};
