//! Match lifecycle: schedule, result negotiation and settlement
//!
//! ```text
//! MATCHED --propose--> PENDING --confirm--> FINISHED
//!                      PENDING --reject---> MATCHED
//! ```
//!
//! Settlement computes new ratings from the home club's point of view and
//! hands them to the store, which applies them only if neither the match nor
//! either rating changed in between.

use crate::error::{MatchmakingError, Result};
use crate::identity::{resolve_participant_club, IdentityProvider};
use crate::lifecycle::views::{
    name_of, rank_clubs, ConfirmationOutcome, FinishedMatch, MatchDetail, MatchSummary,
    RankingEntry,
};
use crate::metrics::MetricsCollector;
use crate::notify::{Notification, NotificationDispatcher, NotificationKind};
use crate::rating::RatingCalculator;
use crate::store::{ConfirmOutcome, MatchQueueStore, RankingQuery, Settlement};
use crate::types::{
    ClubId, GameResult, Match, MatchStatus, MemberId, ResultProposal, Schedule, ScoreSheet,
};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Number of clubs returned by the leaderboard
pub const RANKING_LIMIT: usize = 50;

/// Default length of a club's finished-match history
pub const FINISHED_HISTORY_LIMIT: usize = 5;

pub struct MatchLifecycle {
    store: Arc<dyn MatchQueueStore>,
    identity: Arc<dyn IdentityProvider>,
    calculator: Arc<dyn RatingCalculator>,
    notifications: Arc<NotificationDispatcher>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MatchLifecycle {
    pub fn new(
        store: Arc<dyn MatchQueueStore>,
        identity: Arc<dyn IdentityProvider>,
        calculator: Arc<dyn RatingCalculator>,
        notifications: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            identity,
            calculator,
            notifications,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load a match and the club the caller acts for in it
    async fn load_for(&self, caller: &MemberId, room_id: &str) -> Result<(Match, ClubId)> {
        let record = self.store.get_match_by_room(room_id).await?;
        let my_club = resolve_participant_club(self.identity.as_ref(), caller, &record).await?;
        Ok((record, my_club))
    }

    async fn opponent_name(&self, record: &Match, my_club: ClubId) -> Result<String> {
        let opponent = record
            .opponent_of(my_club)
            .ok_or_else(|| MatchmakingError::InternalError {
                message: format!("Club {} is not part of room {}", my_club, record.room_id),
            })?;
        let clubs = self.store.get_clubs(&[opponent]).await?;
        Ok(name_of(&clubs, opponent))
    }

    fn notify_opponent(&self, record: &Match, my_club: ClubId, kind: NotificationKind) {
        if let Some(opponent) = record.opponent_of(my_club) {
            let mut payload = HashMap::new();
            payload.insert("roomId".to_string(), record.room_id.clone());
            payload.insert("fromClubId".to_string(), my_club.to_string());
            payload.insert("status".to_string(), record.status.to_string());
            self.notifications.dispatch(opponent, kind, payload);
        }
    }

    fn observe(&self, operation: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_operation(operation, started.elapsed());
        }
    }

    /// Submit (or overwrite) the score pair for a match
    pub async fn propose_result(
        &self,
        caller: &MemberId,
        room_id: &str,
        my_score: i64,
        op_score: i64,
    ) -> Result<MatchDetail> {
        let started = Instant::now();
        let (record, my_club) = self.load_for(caller, room_id).await?;

        let my_score = checked_score(my_score)?;
        let op_score = checked_score(op_score)?;
        let opponent = record
            .opponent_of(my_club)
            .ok_or_else(|| MatchmakingError::unauthorized("Not a participant"))?;
        let name = self.opponent_name(&record, my_club).await?;

        let proposal = ResultProposal {
            scores: ScoreSheet::new(my_club, my_score, opponent, op_score),
            proposer_club: my_club,
            proposer_member: caller.clone(),
            proposed_at: current_timestamp(),
        };
        let record = self.store.propose_result(room_id, proposal).await?;

        info!(
            "Club {} proposed {}-{} for room {}",
            my_club, my_score, op_score, room_id
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_result_proposed();
        }
        self.notify_opponent(&record, my_club, NotificationKind::ResultProposed);

        self.observe("propose_result", started);
        Ok(MatchDetail::oriented(&record, my_club, caller, name))
    }

    /// Accept or reject the pending proposal
    pub async fn confirm_result(
        &self,
        caller: &MemberId,
        room_id: &str,
        accept: bool,
    ) -> Result<ConfirmationOutcome> {
        let started = Instant::now();
        let (record, my_club) = self.load_for(caller, room_id).await?;

        let outcome = if accept {
            self.accept(record, my_club).await?
        } else {
            self.reject(record, my_club).await?
        };

        self.observe("confirm_result", started);
        Ok(outcome)
    }

    async fn reject(&self, record: Match, my_club: ClubId) -> Result<ConfirmationOutcome> {
        let was_pending = record.status == MatchStatus::Pending;
        let record = self.store.reject_result(&record.room_id).await?;

        if was_pending {
            info!("Club {} rejected the result of room {}", my_club, record.room_id);
            if let Some(metrics) = &self.metrics {
                metrics.record_result_rejected();
            }
            self.notify_opponent(&record, my_club, NotificationKind::ResultRejected);
        }

        Ok(ConfirmationOutcome::from_match(&record, false))
    }

    async fn accept(&self, record: Match, my_club: ClubId) -> Result<ConfirmationOutcome> {
        if record.status == MatchStatus::Finished {
            info!("Room {} already finished; confirmation is a no-op", record.room_id);
            return Ok(ConfirmationOutcome::from_match(&record, true));
        }

        let proposal = match (&record.status, &record.proposal) {
            (MatchStatus::Pending, Some(proposal)) => proposal,
            _ => {
                return Err(MatchmakingError::conflict(format!(
                    "No result has been proposed for room {}",
                    record.room_id
                )))
            }
        };

        let (home_score, away_score) = match (
            proposal.scores.score_of(record.home_club),
            proposal.scores.score_of(record.away_club),
        ) {
            (Some(home), Some(away)) => (home, away),
            _ => {
                return Err(MatchmakingError::InternalError {
                    message: format!("Proposal for room {} is missing a score", record.room_id),
                })
            }
        };
        let home_result = GameResult::from_scores(home_score, away_score);

        let clubs = self
            .store
            .get_clubs(&[record.home_club, record.away_club])
            .await?;
        let home = clubs
            .get(&record.home_club)
            .ok_or_else(|| MatchmakingError::club_not_found(record.home_club))?;
        let away = clubs
            .get(&record.away_club)
            .ok_or_else(|| MatchmakingError::club_not_found(record.away_club))?;

        let update = self
            .calculator
            .calculate(home.rating, away.rating, home_result)?;

        let settlement = Settlement {
            expected_version: record.version,
            home_result,
            update,
            finished_at: current_timestamp(),
        };

        match self.store.confirm_result(&record.room_id, settlement).await? {
            ConfirmOutcome::Applied(finished) => {
                info!(
                    "Room {} settled by club {}: club {} {} -> {}, club {} {} -> {}",
                    finished.room_id,
                    my_club,
                    finished.home_club,
                    update.home_old,
                    update.home_new,
                    finished.away_club,
                    update.away_old,
                    update.away_new
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_result_confirmed(&[update.home_delta(), update.away_delta()]);
                }

                self.notifications
                    .dispatch_all(finished.rating_changes.iter().map(|change| {
                        let mut payload = HashMap::new();
                        payload.insert("roomId".to_string(), finished.room_id.clone());
                        payload.insert(
                            "result".to_string(),
                            format!("{:?}", change.result).to_uppercase(),
                        );
                        payload.insert("oldRating".to_string(), change.old_rating.to_string());
                        payload.insert("newRating".to_string(), change.new_rating.to_string());
                        Notification {
                            club_id: change.club_id,
                            kind: NotificationKind::ResultConfirmed,
                            payload,
                        }
                    }));

                Ok(ConfirmationOutcome::from_match(&finished, false))
            }
            ConfirmOutcome::AlreadyFinished(finished) => {
                warn!(
                    "Room {} was settled concurrently; keeping the first settlement",
                    finished.room_id
                );
                Ok(ConfirmationOutcome::from_match(&finished, true))
            }
        }
    }

    /// Set or replace the shared schedule
    pub async fn update_schedule(
        &self,
        caller: &MemberId,
        room_id: &str,
        when: DateTime<Utc>,
        location: &str,
    ) -> Result<MatchDetail> {
        let location = location.trim();
        if location.is_empty() {
            return Err(MatchmakingError::invalid("Location cannot be empty"));
        }

        let (current, my_club) = self.load_for(caller, room_id).await?;
        let name = self.opponent_name(&current, my_club).await?;
        let record = self
            .store
            .update_schedule(
                room_id,
                Schedule {
                    when,
                    location: location.to_string(),
                },
            )
            .await?;

        info!("Club {} scheduled room {} at {} ({})", my_club, room_id, when, location);
        if let Some(metrics) = &self.metrics {
            metrics.record_schedule_updated();
        }
        self.notify_opponent(&record, my_club, NotificationKind::ScheduleUpdated);

        Ok(MatchDetail::oriented(&record, my_club, caller, name))
    }

    /// One match oriented to the caller's club
    pub async fn match_detail(&self, caller: &MemberId, room_id: &str) -> Result<MatchDetail> {
        let (record, my_club) = self.load_for(caller, room_id).await?;
        let name = self.opponent_name(&record, my_club).await?;
        Ok(MatchDetail::oriented(&record, my_club, caller, name))
    }

    /// Every match of every club the caller belongs to, most recent first
    pub async fn my_matches(&self, caller: &MemberId) -> Result<Vec<MatchSummary>> {
        let my_clubs = self.identity.clubs_of(caller).await?;
        if my_clubs.is_empty() {
            return Ok(Vec::new());
        }

        let club_ids: Vec<ClubId> = my_clubs.iter().copied().collect();
        let records = self.store.get_matches_for_clubs(&club_ids).await?;

        let opponents: Vec<ClubId> = records
            .iter()
            .flat_map(|record| [record.home_club, record.away_club])
            .collect();
        let clubs = self.store.get_clubs(&opponents).await?;

        Ok(records
            .iter()
            .map(|record| {
                let my_club = if my_clubs.contains(&record.home_club) {
                    record.home_club
                } else {
                    record.away_club
                };
                let opponent = record.opponent_of(my_club).unwrap_or_default();
                MatchSummary {
                    room_id: record.room_id.clone(),
                    status: record.status,
                    my_club_id: my_club,
                    opponent_club_id: opponent,
                    opponent_name: name_of(&clubs, opponent),
                    sport: record.sport.clone(),
                    region: record.region.to_string(),
                    created_at: record.created_at,
                }
            })
            .collect())
    }

    /// Most recently played FINISHED matches of a club
    pub async fn finished_matches(&self, club_id: ClubId, limit: Option<usize>) -> Result<Vec<FinishedMatch>> {
        self.store.get_club(club_id).await?;

        let limit = limit.unwrap_or(FINISHED_HISTORY_LIMIT);
        let records = self.store.finished_matches(club_id, limit).await?;

        let opponents: Vec<ClubId> = records
            .iter()
            .filter_map(|record| record.opponent_of(club_id))
            .collect();
        let clubs = self.store.get_clubs(&opponents).await?;

        Ok(records
            .iter()
            .map(|record| {
                let opponent = record.opponent_of(club_id).unwrap_or_default();
                FinishedMatch::oriented(record, club_id, name_of(&clubs, opponent))
            })
            .collect())
    }

    /// Leaderboard of a sport, optionally narrowed to a region
    pub async fn ranking(
        &self,
        sport: &str,
        primary: Option<&str>,
        secondary: Option<&str>,
    ) -> Result<Vec<RankingEntry>> {
        let sport = sport.trim();
        if sport.is_empty() {
            return Err(MatchmakingError::invalid("Sport cannot be empty"));
        }

        let non_empty = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let query = RankingQuery {
            sport: sport.to_string(),
            primary: non_empty(primary),
            secondary: non_empty(secondary),
            limit: RANKING_LIMIT,
        };

        let clubs = self.store.ranking(&query).await?;
        Ok(rank_clubs(clubs))
    }
}

fn checked_score(score: i64) -> Result<u32> {
    u32::try_from(score).map_err(|_| {
        MatchmakingError::invalid(format!("Score must be a non-negative integer, got {}", score))
    })
}
