//! In-memory implementation of the match store
//!
//! All state sits behind one lock and every trait operation takes it exactly
//! once, so each operation is a single atomic transaction.

use crate::error::{MatchmakingError, Result};
use crate::store::repository::{
    ClubDirectory, ConfirmOutcome, MatchCriteria, MatchQueueStore, PairingRequest, RankingQuery,
    Settlement, StoreStats,
};
use crate::types::{
    Club, ClubId, EntryId, Match, MatchStatus, QueueEntry, QueueStatus, ResultProposal, RoomId,
    Schedule,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug)]
struct Stored<T> {
    seq: u64,
    record: T,
}

#[derive(Debug, Default)]
struct StoreState {
    clubs: HashMap<ClubId, Club>,
    entries: HashMap<EntryId, Stored<QueueEntry>>,
    matches: HashMap<RoomId, Stored<Match>>,
    next_seq: u64,
}

impl StoreState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn match_mut(&mut self, room_id: &str) -> Result<&mut Match> {
        self.matches
            .get_mut(room_id)
            .map(|stored| &mut stored.record)
            .ok_or_else(|| MatchmakingError::room_not_found(room_id))
    }
}

/// Reference [`MatchQueueStore`] kept entirely in process memory
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    state: RwLock<StoreState>,
    unavailable: AtomicBool,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with clubs
    pub fn with_clubs(clubs: impl IntoIterator<Item = Club>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            for club in clubs {
                state.clubs.insert(club.id, club);
            }
        }
        store
    }

    /// Simulate an outage: while unavailable every operation fails with `StoreUnavailable`
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MatchmakingError::StoreUnavailable {
                message: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.check_available()?;
        self.state
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store read lock".to_string(),
            })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.check_available()?;
        self.state
            .write()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire store write lock".to_string(),
            })
    }
}

fn ensure_open(record: &Match, action: &str) -> Result<()> {
    if record.status == MatchStatus::Finished {
        return Err(MatchmakingError::conflict(format!(
            "Cannot {} for finished match {}",
            action, record.room_id
        )));
    }
    Ok(())
}

#[async_trait]
impl ClubDirectory for InMemoryMatchStore {
    async fn get_club(&self, club_id: ClubId) -> Result<Club> {
        let state = self.read()?;
        state
            .clubs
            .get(&club_id)
            .cloned()
            .ok_or_else(|| MatchmakingError::club_not_found(club_id))
    }

    async fn get_clubs(&self, club_ids: &[ClubId]) -> Result<HashMap<ClubId, Club>> {
        let state = self.read()?;
        Ok(club_ids
            .iter()
            .filter_map(|id| state.clubs.get(id).map(|club| (*id, club.clone())))
            .collect())
    }
}

#[async_trait]
impl MatchQueueStore for InMemoryMatchStore {
    async fn find_compatible_waiting(&self, criteria: &MatchCriteria) -> Result<Option<QueueEntry>> {
        let state = self.read()?;
        Ok(state
            .entries
            .values()
            .filter(|stored| stored.record.status == QueueStatus::Waiting)
            .filter(|stored| criteria.accepts(&stored.record))
            .min_by_key(|stored| (stored.record.created_at, stored.seq))
            .map(|stored| stored.record.clone()))
    }

    async fn reserve_pair(&self, waiting_entry_id: EntryId, request: PairingRequest) -> Result<Match> {
        let mut state = self.write()?;

        let waiting = state
            .entries
            .get(&waiting_entry_id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| MatchmakingError::NotFound {
                entity: "Queue entry",
                id: waiting_entry_id.to_string(),
            })?;

        if waiting.status != QueueStatus::Waiting {
            return Err(MatchmakingError::conflict(format!(
                "Queue entry {} is no longer waiting",
                waiting_entry_id
            )));
        }
        if waiting.club_id == request.club_id {
            return Err(MatchmakingError::conflict(format!(
                "Club {} cannot be paired with itself",
                request.club_id
            )));
        }
        if state.matches.contains_key(&request.room_id) {
            return Err(MatchmakingError::conflict(format!(
                "Room {} already exists",
                request.room_id
            )));
        }

        // Consume the waiting entry and, if present, the requester's own
        for stored in state.entries.values_mut() {
            let entry = &mut stored.record;
            let is_target = entry.id == waiting_entry_id;
            let is_requester_waiting =
                entry.club_id == request.club_id && entry.status == QueueStatus::Waiting;
            if is_target || is_requester_waiting {
                entry.status = QueueStatus::Matched;
                entry.room_id = Some(request.room_id.clone());
            }
        }

        let record = Match {
            room_id: request.room_id.clone(),
            home_club: waiting.club_id,
            away_club: request.club_id,
            sport: request.sport,
            region: waiting.region,
            status: MatchStatus::Matched,
            proposal: None,
            schedule: None,
            rating_changes: Vec::new(),
            version: 1,
            created_at: current_timestamp(),
            finished_at: None,
        };

        let seq = state.next_seq();
        state.matches.insert(
            record.room_id.clone(),
            Stored {
                seq,
                record: record.clone(),
            },
        );

        debug!(
            "Reserved entry {} for room {} ({} vs {})",
            waiting_entry_id, record.room_id, record.home_club, record.away_club
        );
        Ok(record)
    }

    async fn enqueue(&self, entry: QueueEntry) -> Result<QueueEntry> {
        let mut state = self.write()?;

        let already_waiting = state
            .entries
            .values()
            .any(|stored| stored.record.club_id == entry.club_id && stored.record.status == QueueStatus::Waiting);
        if already_waiting {
            return Err(MatchmakingError::AlreadyWaiting {
                club_id: entry.club_id,
            });
        }

        let seq = state.next_seq();
        state.entries.insert(
            entry.id,
            Stored {
                seq,
                record: entry.clone(),
            },
        );
        Ok(entry)
    }

    async fn get_queue_entry(&self, entry_id: EntryId) -> Result<QueueEntry> {
        let state = self.read()?;
        state
            .entries
            .get(&entry_id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| MatchmakingError::NotFound {
                entity: "Queue entry",
                id: entry_id.to_string(),
            })
    }

    async fn get_match_by_room(&self, room_id: &str) -> Result<Match> {
        let state = self.read()?;
        state
            .matches
            .get(room_id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| MatchmakingError::room_not_found(room_id))
    }

    async fn get_matches_for_clubs(&self, club_ids: &[ClubId]) -> Result<Vec<Match>> {
        let state = self.read()?;
        let mut found: Vec<&Stored<Match>> = state
            .matches
            .values()
            .filter(|stored| club_ids.iter().any(|id| stored.record.involves(*id)))
            .collect();
        found.sort_by(|a, b| {
            (b.record.created_at, b.seq).cmp(&(a.record.created_at, a.seq))
        });
        Ok(found.into_iter().map(|stored| stored.record.clone()).collect())
    }

    async fn update_schedule(&self, room_id: &str, schedule: Schedule) -> Result<Match> {
        let mut state = self.write()?;
        let record = state.match_mut(room_id)?;
        ensure_open(record, "set a schedule")?;

        record.schedule = Some(schedule);
        record.version += 1;
        Ok(record.clone())
    }

    async fn propose_result(&self, room_id: &str, proposal: ResultProposal) -> Result<Match> {
        let mut state = self.write()?;
        let record = state.match_mut(room_id)?;
        ensure_open(record, "propose a result")?;

        if !record.involves(proposal.proposer_club) {
            return Err(MatchmakingError::invalid(format!(
                "Club {} is not part of room {}",
                proposal.proposer_club, room_id
            )));
        }

        record.proposal = Some(proposal);
        record.status = MatchStatus::Pending;
        record.version += 1;
        Ok(record.clone())
    }

    async fn reject_result(&self, room_id: &str) -> Result<Match> {
        let mut state = self.write()?;
        let record = state.match_mut(room_id)?;

        match record.status {
            MatchStatus::Finished => {
                return Err(MatchmakingError::conflict(format!(
                    "Cannot reject the result of finished match {}",
                    room_id
                )))
            }
            MatchStatus::Matched => {}
            MatchStatus::Pending => {
                record.status = MatchStatus::Matched;
                record.proposal = None;
                record.version += 1;
            }
        }
        Ok(record.clone())
    }

    async fn confirm_result(&self, room_id: &str, settlement: Settlement) -> Result<ConfirmOutcome> {
        let mut state = self.write()?;

        let (home, away) = {
            let record = state.match_mut(room_id)?;
            match record.status {
                MatchStatus::Finished => return Ok(ConfirmOutcome::AlreadyFinished(record.clone())),
                MatchStatus::Matched => {
                    return Err(MatchmakingError::conflict(format!(
                        "Room {} has no pending result",
                        room_id
                    )))
                }
                MatchStatus::Pending => {}
            }
            if record.version != settlement.expected_version {
                return Err(MatchmakingError::conflict(format!(
                    "Room {} changed during confirmation (version {} != {})",
                    room_id, record.version, settlement.expected_version
                )));
            }
            (record.home_club, record.away_club)
        };

        let update = settlement.update;
        for (club_id, expected) in [(home, update.home_old), (away, update.away_old)] {
            let club = state
                .clubs
                .get(&club_id)
                .ok_or_else(|| MatchmakingError::club_not_found(club_id))?;
            if club.rating != expected {
                return Err(MatchmakingError::conflict(format!(
                    "Rating of club {} changed during confirmation",
                    club_id
                )));
            }
        }

        if let Some(club) = state.clubs.get_mut(&home) {
            club.record_result(update.home_new, settlement.home_result);
        }
        if let Some(club) = state.clubs.get_mut(&away) {
            club.record_result(update.away_new, settlement.home_result.reversed());
        }

        let record = state.match_mut(room_id)?;
        record.status = MatchStatus::Finished;
        record.finished_at = Some(settlement.finished_at);
        record.rating_changes = update.into_changes(home, away, settlement.home_result);
        record.version += 1;

        Ok(ConfirmOutcome::Applied(record.clone()))
    }

    async fn ranking(&self, query: &RankingQuery) -> Result<Vec<Club>> {
        let state = self.read()?;
        let mut clubs: Vec<Club> = state
            .clubs
            .values()
            .filter(|club| club.sport == query.sport)
            .filter(|club| {
                query
                    .primary
                    .as_ref()
                    .map_or(true, |primary| &club.region.primary == primary)
            })
            .filter(|club| {
                query
                    .secondary
                    .as_ref()
                    .map_or(true, |secondary| club.region.secondary.as_ref() == Some(secondary))
            })
            .cloned()
            .collect();

        clubs.sort_by(|a, b| b.rating.cmp(&a.rating).then(a.id.cmp(&b.id)));
        clubs.truncate(query.limit);
        Ok(clubs)
    }

    async fn finished_matches(&self, club_id: ClubId, limit: usize) -> Result<Vec<Match>> {
        let state = self.read()?;
        let mut found: Vec<&Stored<Match>> = state
            .matches
            .values()
            .filter(|stored| stored.record.status == MatchStatus::Finished)
            .filter(|stored| stored.record.involves(club_id))
            .collect();
        found.sort_by(|a, b| {
            (b.record.played_at(), b.seq).cmp(&(a.record.played_at(), a.seq))
        });
        Ok(found
            .into_iter()
            .take(limit)
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.read()?;
        let count = |status: MatchStatus| {
            state
                .matches
                .values()
                .filter(|stored| stored.record.status == status)
                .count()
        };

        Ok(StoreStats {
            clubs: state.clubs.len(),
            waiting_entries: state
                .entries
                .values()
                .filter(|stored| stored.record.status == QueueStatus::Waiting)
                .count(),
            active_matches: count(MatchStatus::Matched),
            pending_matches: count(MatchStatus::Pending),
            finished_matches: count(MatchStatus::Finished),
        })
    }

    async fn upsert_club(&self, club: Club) -> Result<()> {
        let mut state = self.write()?;
        state.clubs.insert(club.id, club);
        Ok(())
    }
}
