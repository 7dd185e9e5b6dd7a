//! Matchmaker: finds a compatible waiting club or queues the requester
//!
//! Pairing relies on the store's compare-and-swap of the waiting entry. A lost
//! race is retried once with a fresh search; after a second loss the request
//! is queued instead.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::identity::{require_admin, IdentityProvider};
use crate::matchmaking::compatibility::NormalizedRequest;
use crate::metrics::MetricsCollector;
use crate::notify::{NotificationDispatcher, NotificationKind};
use crate::store::{MatchQueueStore, PairingRequest};
use crate::types::{Club, Match, MatchOutcome, MatchRequest, MemberId, QueueEntry};
use crate::utils::generate_room_id;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Search-and-reserve attempts before falling back to the queue
const PAIRING_ATTEMPTS: usize = 2;

pub struct Matchmaker {
    store: Arc<dyn MatchQueueStore>,
    identity: Arc<dyn IdentityProvider>,
    notifications: Arc<NotificationDispatcher>,
    metrics: Option<Arc<MetricsCollector>>,
    settings: MatchmakingSettings,
}

impl Matchmaker {
    pub fn new(
        store: Arc<dyn MatchQueueStore>,
        identity: Arc<dyn IdentityProvider>,
        notifications: Arc<NotificationDispatcher>,
        settings: MatchmakingSettings,
    ) -> Self {
        Self {
            store,
            identity,
            notifications,
            metrics: None,
            settings,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &MatchmakingSettings {
        &self.settings
    }

    /// Pair the caller's club with a compatible waiting club, or queue it
    pub async fn request_match(&self, caller: &MemberId, request: MatchRequest) -> Result<MatchOutcome> {
        let started = Instant::now();
        let club_id = request.club_id;

        let result = self.try_request_match(caller, request).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(MatchOutcome::Matched { .. }) => "matched",
                Ok(MatchOutcome::Waiting { .. }) => "waiting",
                Err(MatchmakingError::AlreadyWaiting { .. }) => "already_waiting",
                Err(MatchmakingError::Unauthorized { .. }) => "rejected",
                Err(_) => "failed",
            };
            metrics.record_match_request(outcome, started.elapsed());

            if result.is_ok() {
                match self.store.stats().await {
                    Ok(stats) => metrics.update_from_store_stats(&stats),
                    Err(e) => debug!("Skipping gauge refresh after request: {}", e),
                }
            }
        }

        if let Err(e) = &result {
            warn!("Match request for club {} failed: {}", club_id, e);
        }
        result
    }

    async fn try_request_match(&self, caller: &MemberId, request: MatchRequest) -> Result<MatchOutcome> {
        require_admin(self.identity.as_ref(), caller, request.club_id).await?;

        let club = self.store.get_club(request.club_id).await?;
        let normalized = NormalizedRequest::from_request(&request)?;
        let criteria = normalized.criteria(&club, &self.settings);

        info!(
            "Club {} ({}) requests a {} match in {} (rating {}, {:?}/{:?})",
            club.id,
            club.name,
            normalized.sport,
            normalized.region,
            club.rating,
            normalized.day_preference,
            normalized.time_preference
        );

        for attempt in 1..=PAIRING_ATTEMPTS {
            let Some(waiting) = self.store.find_compatible_waiting(&criteria).await? else {
                debug!("No compatible opponent for club {}", club.id);
                break;
            };

            let pairing = PairingRequest {
                room_id: generate_room_id(),
                club_id: club.id,
                sport: normalized.sport.clone(),
                region: normalized.region.clone(),
            };

            match self.store.reserve_pair(waiting.id, pairing).await {
                Ok(record) => {
                    info!(
                        "Paired club {} with waiting club {} in room {}",
                        club.id, waiting.club_id, record.room_id
                    );
                    self.announce_match(&record, &club, &waiting).await;
                    return Ok(MatchOutcome::Matched {
                        room_id: record.room_id,
                        opponent_club_id: waiting.club_id,
                    });
                }
                Err(e) if e.is_conflict() => {
                    warn!(
                        "Club {} lost the race for entry {} (attempt {}/{})",
                        club.id, waiting.id, attempt, PAIRING_ATTEMPTS
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_pairing_conflict();
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let entry = self.store.enqueue(normalized.queue_entry(&club)).await?;
        info!("Club {} is waiting with entry {}", club.id, entry.id);

        Ok(MatchOutcome::Waiting { entry_id: entry.id })
    }

    /// Notify both clubs after the pairing has committed
    async fn announce_match(&self, record: &Match, requester: &Club, waiting: &QueueEntry) {
        let opponent_name = match self.store.get_club(waiting.club_id).await {
            Ok(opponent) => opponent.name,
            Err(e) => {
                debug!("Could not load club {} for notification: {}", waiting.club_id, e);
                String::new()
            }
        };

        let base = |opponent_id: u64, opponent: &str| {
            let mut payload = HashMap::new();
            payload.insert("roomId".to_string(), record.room_id.clone());
            payload.insert("opponentClubId".to_string(), opponent_id.to_string());
            payload.insert("opponentName".to_string(), opponent.to_string());
            payload.insert("sport".to_string(), record.sport.clone());
            payload
        };

        let mut to_waiting = base(requester.id, &requester.name);
        if let Some(handle) = &waiting.connection_handle {
            to_waiting.insert("connectionHandle".to_string(), handle.clone());
        }
        self.notifications
            .dispatch(waiting.club_id, NotificationKind::MatchFound, to_waiting);

        self.notifications.dispatch(
            requester.id,
            NotificationKind::MatchFound,
            base(waiting.club_id, &opponent_name),
        );
    }
}
