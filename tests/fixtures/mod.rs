//! Test fixtures shared by the integration and load suites

#![allow(dead_code)]

use async_trait::async_trait;
use matchday::config::MatchmakingSettings;
use matchday::error::{MatchmakingError, Result};
use matchday::identity::InMemoryIdentityProvider;
use matchday::lifecycle::MatchLifecycle;
use matchday::matchmaking::Matchmaker;
use matchday::notify::{NotificationDispatcher, RecordingNotificationGateway};
use matchday::rating::EloRatingCalculator;
use matchday::store::{
    ClubDirectory, ConfirmOutcome, InMemoryMatchStore, MatchCriteria, MatchQueueStore,
    PairingRequest, RankingQuery, Settlement, StoreStats,
};
use matchday::types::{
    Club, ClubId, ClubRole, EntryId, Match, MatchRequest, QueueEntry, Region, ResultProposal,
    Schedule,
};
use matchday::utils::generate_room_id;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Complete in-process system wired the way `AppState` wires it
pub struct TestSystem {
    pub store: Arc<dyn MatchQueueStore>,
    pub identity: Arc<InMemoryIdentityProvider>,
    pub gateway: Arc<RecordingNotificationGateway>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub matchmaker: Arc<Matchmaker>,
    pub lifecycle: Arc<MatchLifecycle>,
}

impl TestSystem {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryMatchStore::new()), MatchmakingSettings::default())
    }

    pub fn with_settings(settings: MatchmakingSettings) -> Self {
        Self::with_store(Arc::new(InMemoryMatchStore::new()), settings)
    }

    pub fn with_store(store: Arc<dyn MatchQueueStore>, settings: MatchmakingSettings) -> Self {
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let gateway = Arc::new(RecordingNotificationGateway::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(gateway.clone(), None));

        let matchmaker = Arc::new(Matchmaker::new(
            store.clone(),
            identity.clone(),
            dispatcher.clone(),
            settings,
        ));
        let lifecycle = Arc::new(MatchLifecycle::new(
            store.clone(),
            identity.clone(),
            Arc::new(EloRatingCalculator::default()),
            dispatcher.clone(),
        ));

        Self {
            store,
            identity,
            gateway,
            dispatcher,
            matchmaker,
            lifecycle,
        }
    }

    /// Register a club with an admin (`admin{id}`) and a plain member (`member{id}`)
    pub async fn add_club(&self, id: ClubId, name: &str, region: Region, rating: i32) -> Club {
        let club = Club::new(id, name, "soccer", region).with_rating(rating);
        self.store.upsert_club(club.clone()).await.unwrap();

        self.identity.add_session(admin_token(id), admin(id));
        self.identity.add_membership(admin(id), id, ClubRole::Admin);
        self.identity.add_session(member_token(id), member(id));
        self.identity.add_membership(member(id), id, ClubRole::Member);
        club
    }

    pub async fn club(&self, id: ClubId) -> Club {
        self.store.get_club(id).await.unwrap()
    }

    /// Wait until every background notification has been delivered
    pub async fn settle_notifications(&self) {
        self.dispatcher.drain().await;
    }
}

pub fn admin(club_id: ClubId) -> String {
    format!("admin{}", club_id)
}

pub fn member(club_id: ClubId) -> String {
    format!("member{}", club_id)
}

pub fn admin_token(club_id: ClubId) -> String {
    format!("token-admin{}", club_id)
}

pub fn member_token(club_id: ClubId) -> String {
    format!("token-member{}", club_id)
}

pub fn gangnam() -> Region {
    Region::new("Seoul", Some("Gangnam"))
}

pub fn mapo() -> Region {
    Region::new("Seoul", Some("Mapo"))
}

/// A soccer request for the given club and region
pub fn match_request(club_id: ClubId, region: Region) -> MatchRequest {
    MatchRequest {
        club_id,
        sport: "soccer".to_string(),
        region,
        day_pref: Some("WEEKEND".to_string()),
        time_pref: Some("ANY".to_string()),
        connection_handle: Some(format!("conn-{}", club_id)),
    }
}

/// Store wrapper that loses the next `pending_steals` pairing races.
///
/// Before delegating a `reserve_pair`, a rival reserves the same waiting
/// entry, so the caller's compare-and-swap fails with `Conflict`. Batch club
/// lookups can also be switched off to simulate a partial outage.
pub struct ContendedStore {
    inner: Arc<InMemoryMatchStore>,
    pending_steals: AtomicUsize,
    rival_club: ClubId,
    steals: AtomicUsize,
    club_lookups_down: AtomicBool,
}

impl ContendedStore {
    pub fn new(inner: Arc<InMemoryMatchStore>, steals: usize, rival_club: ClubId) -> Self {
        Self {
            inner,
            pending_steals: AtomicUsize::new(steals),
            rival_club,
            steals: AtomicUsize::new(0),
            club_lookups_down: AtomicBool::new(false),
        }
    }

    /// Races actually lost so far
    pub fn steals(&self) -> usize {
        self.steals.load(Ordering::SeqCst)
    }

    /// Make `get_clubs` fail with `StoreUnavailable` until switched back
    pub fn fail_club_lookups(&self, down: bool) {
        self.club_lookups_down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClubDirectory for ContendedStore {
    async fn get_club(&self, club_id: ClubId) -> Result<Club> {
        self.inner.get_club(club_id).await
    }

    async fn get_clubs(&self, club_ids: &[ClubId]) -> Result<HashMap<ClubId, Club>> {
        if self.club_lookups_down.load(Ordering::SeqCst) {
            return Err(MatchmakingError::StoreUnavailable {
                message: "club lookups are down".to_string(),
            });
        }
        self.inner.get_clubs(club_ids).await
    }
}

#[async_trait]
impl MatchQueueStore for ContendedStore {
    async fn find_compatible_waiting(&self, criteria: &MatchCriteria) -> Result<Option<QueueEntry>> {
        self.inner.find_compatible_waiting(criteria).await
    }

    async fn reserve_pair(&self, waiting_entry_id: EntryId, request: PairingRequest) -> Result<Match> {
        let steal = self
            .pending_steals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if steal {
            let rival = PairingRequest {
                room_id: generate_room_id(),
                club_id: self.rival_club,
                sport: request.sport.clone(),
                region: request.region.clone(),
            };
            if self.inner.reserve_pair(waiting_entry_id, rival).await.is_ok() {
                self.steals.fetch_add(1, Ordering::SeqCst);
            }
        }

        self.inner.reserve_pair(waiting_entry_id, request).await
    }

    async fn enqueue(&self, entry: QueueEntry) -> Result<QueueEntry> {
        self.inner.enqueue(entry).await
    }

    async fn get_queue_entry(&self, entry_id: EntryId) -> Result<QueueEntry> {
        self.inner.get_queue_entry(entry_id).await
    }

    async fn get_match_by_room(&self, room_id: &str) -> Result<Match> {
        self.inner.get_match_by_room(room_id).await
    }

    async fn get_matches_for_clubs(&self, club_ids: &[ClubId]) -> Result<Vec<Match>> {
        self.inner.get_matches_for_clubs(club_ids).await
    }

    async fn update_schedule(&self, room_id: &str, schedule: Schedule) -> Result<Match> {
        self.inner.update_schedule(room_id, schedule).await
    }

    async fn propose_result(&self, room_id: &str, proposal: ResultProposal) -> Result<Match> {
        self.inner.propose_result(room_id, proposal).await
    }

    async fn reject_result(&self, room_id: &str) -> Result<Match> {
        self.inner.reject_result(room_id).await
    }

    async fn confirm_result(&self, room_id: &str, settlement: Settlement) -> Result<ConfirmOutcome> {
        self.inner.confirm_result(room_id, settlement).await
    }

    async fn ranking(&self, query: &RankingQuery) -> Result<Vec<Club>> {
        self.inner.ranking(query).await
    }

    async fn finished_matches(&self, club_id: ClubId, limit: usize) -> Result<Vec<Match>> {
        self.inner.finished_matches(club_id, limit).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }

    async fn upsert_club(&self, club: Club) -> Result<()> {
        self.inner.upsert_club(club).await
    }
}
