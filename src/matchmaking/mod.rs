//! Matching algorithm and pairing transaction

pub mod compatibility;
pub mod matchmaker;

pub use compatibility::NormalizedRequest;
pub use matchmaker::Matchmaker;
