//! Match state machine and caller-relative reads

pub mod machine;
pub mod views;

pub use machine::{MatchLifecycle, FINISHED_HISTORY_LIMIT, RANKING_LIMIT};
pub use views::{
    ConfirmationOutcome, FinishedMatch, MatchDetail, MatchSummary, RankingEntry, ScheduleView,
};
