//! End-to-end match workflows through the library API
//!
//! Request, pair, schedule, propose, confirm or reject, then the reads that
//! depend on the settled state: detail, history and ranking.

use crate::fixtures::{admin, gangnam, mapo, match_request, member, ContendedStore, TestSystem};
use chrono::{TimeZone, Utc};
use matchday::config::MatchmakingSettings;
use matchday::error::ErrorKind;
use matchday::notify::NotificationKind;
use matchday::store::InMemoryMatchStore;
use matchday::types::{GameResult, MatchOutcome, MatchStatus, RegionGranularity};
use std::sync::Arc;
use tokio_test::assert_ok;

/// A (1000) waits, B (1050) pairs with it; returns the room id
async fn paired_system() -> (TestSystem, String) {
    let system = TestSystem::new();
    let room_id = pair_alpha_and_beta(&system).await;
    (system, room_id)
}

async fn pair_alpha_and_beta(system: &TestSystem) -> String {
    system.add_club(1, "Alpha FC", gangnam(), 1000).await;
    system.add_club(2, "Beta FC", gangnam(), 1050).await;

    let first = assert_ok!(
        system
            .matchmaker
            .request_match(&admin(1), match_request(1, gangnam()))
            .await
    );
    assert!(matches!(first, MatchOutcome::Waiting { .. }));

    let second = assert_ok!(
        system
            .matchmaker
            .request_match(&admin(2), match_request(2, gangnam()))
            .await
    );
    let room_id = match second {
        MatchOutcome::Matched {
            room_id,
            opponent_club_id,
        } => {
            assert_eq!(opponent_club_id, 1);
            room_id
        }
        other => panic!("expected a match, got {:?}", other),
    };

    room_id
}

#[tokio::test]
async fn test_seoul_gangnam_end_to_end() {
    let (system, room_id) = paired_system().await;
    assert!(room_id.starts_with("room_"));

    // Both clubs hear about the match; the waiting side gets its connection handle
    system.settle_notifications().await;
    let to_alpha = system.gateway.messages_for(1);
    let to_beta = system.gateway.messages_for(2);
    assert_eq!(to_alpha.len(), 1);
    assert_eq!(to_beta.len(), 1);
    assert_eq!(to_alpha[0].kind, NotificationKind::MatchFound);
    assert_eq!(to_alpha[0].payload["opponentClubId"], "2");
    assert_eq!(to_alpha[0].payload["connectionHandle"], "conn-1");
    assert_eq!(to_beta[0].payload["opponentName"], "Alpha FC");

    // Alpha proposes 3-1 in its own favour
    let proposed = assert_ok!(system.lifecycle.propose_result(&admin(1), &room_id, 3, 1).await);
    assert_eq!(proposed.status, MatchStatus::Pending);
    assert!(proposed.is_proposer);
    assert_eq!((proposed.my_score, proposed.op_score), (Some(3), Some(1)));

    // Beta sees the same proposal from its side
    let beta_view = assert_ok!(system.lifecycle.match_detail(&member(2), &room_id).await);
    assert!(!beta_view.is_proposer);
    assert_eq!((beta_view.my_score, beta_view.op_score), (Some(1), Some(3)));
    assert_eq!(beta_view.opponent_name, "Alpha FC");

    let outcome = assert_ok!(system.lifecycle.confirm_result(&admin(2), &room_id, true).await);
    assert_eq!(outcome.status, MatchStatus::Finished);
    assert!(!outcome.already_finished);

    let alpha = system.club(1).await;
    let beta = system.club(2).await;
    assert_eq!(alpha.rating, 1018);
    assert_eq!(beta.rating, 1032);
    assert_eq!(alpha.rating - 1000, -(beta.rating - 1050));
    assert_eq!((alpha.wins, alpha.losses), (1, 0));
    assert_eq!((beta.wins, beta.losses), (0, 1));

    let alpha_view = assert_ok!(system.lifecycle.match_detail(&member(1), &room_id).await);
    assert_eq!(alpha_view.status, MatchStatus::Finished);
    assert_eq!((alpha_view.my_score, alpha_view.op_score), (Some(3), Some(1)));

    system.settle_notifications().await;
    assert_eq!(system.gateway.count_of(NotificationKind::ResultProposed), 1);
    assert_eq!(system.gateway.count_of(NotificationKind::ResultConfirmed), 2);
}

#[tokio::test]
async fn test_double_confirm_changes_ratings_once() {
    let (system, room_id) = paired_system().await;
    assert_ok!(system.lifecycle.propose_result(&admin(2), &room_id, 2, 2).await);

    let first = assert_ok!(system.lifecycle.confirm_result(&admin(1), &room_id, true).await);
    let after_first = (system.club(1).await.rating, system.club(2).await.rating);

    let second = assert_ok!(system.lifecycle.confirm_result(&member(1), &room_id, true).await);
    let after_second = (system.club(1).await.rating, system.club(2).await.rating);

    assert!(!first.already_finished);
    assert!(second.already_finished);
    assert_eq!(second.status, MatchStatus::Finished);
    assert_eq!(after_first, after_second);
    assert_eq!(first.rating_changes, second.rating_changes);

    // A draw between 1000 and 1050 moves the underdog up
    let alpha_change = first
        .rating_changes
        .iter()
        .find(|change| change.club_id == 1)
        .unwrap();
    assert_eq!(alpha_change.result, GameResult::Draw);
    assert!(alpha_change.delta() > 0);
}

#[tokio::test]
async fn test_reject_then_new_proposal_is_the_one_counted() {
    let (system, room_id) = paired_system().await;

    assert_ok!(system.lifecycle.propose_result(&admin(1), &room_id, 5, 0).await);
    let rejected = assert_ok!(system.lifecycle.confirm_result(&admin(2), &room_id, false).await);
    assert_eq!(rejected.status, MatchStatus::Matched);

    let detail = assert_ok!(system.lifecycle.match_detail(&member(1), &room_id).await);
    assert_eq!(detail.status, MatchStatus::Matched);
    assert_eq!((detail.my_score, detail.op_score), (None, None));
    assert!(!detail.is_proposer);

    // Beta proposes its own version: 2-1 for Beta
    assert_ok!(system.lifecycle.propose_result(&admin(2), &room_id, 2, 1).await);
    assert_ok!(system.lifecycle.confirm_result(&admin(1), &room_id, true).await);

    let alpha = system.club(1).await;
    let beta = system.club(2).await;
    assert_eq!((alpha.wins, alpha.losses), (0, 1));
    assert_eq!((beta.wins, beta.losses), (1, 0));
    assert!(alpha.rating < 1000);
    assert!(beta.rating > 1050);

    system.settle_notifications().await;
    assert_eq!(system.gateway.count_of(NotificationKind::ResultRejected), 1);
}

#[tokio::test]
async fn test_invalid_transitions() {
    let (system, room_id) = paired_system().await;

    // Nothing proposed yet
    let err = system
        .lifecycle
        .confirm_result(&admin(1), &room_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = system
        .lifecycle
        .propose_result(&admin(1), &room_id, -1, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_ok!(system.lifecycle.propose_result(&admin(1), &room_id, 1, 0).await);
    assert_ok!(system.lifecycle.confirm_result(&admin(2), &room_id, true).await);

    // Finished matches are immutable
    let err = system
        .lifecycle
        .propose_result(&admin(1), &room_id, 4, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = system
        .lifecycle
        .confirm_result(&admin(2), &room_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_outsider_cannot_touch_the_match() {
    let (system, room_id) = paired_system().await;
    system.add_club(3, "Gamma FC", gangnam(), 1000).await;

    let err = system
        .lifecycle
        .match_detail(&admin(3), &room_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = system
        .lifecycle
        .propose_result(&admin(3), &room_id, 1, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_schedule_is_shared() {
    let (system, room_id) = paired_system().await;
    let kickoff = Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap();

    let updated = assert_ok!(
        system
            .lifecycle
            .update_schedule(&member(2), &room_id, kickoff, "  Jamsil Field 3 ")
            .await
    );
    let schedule = updated.schedule.unwrap();
    assert_eq!(schedule.location, "Jamsil Field 3");

    let alpha_view = assert_ok!(system.lifecycle.match_detail(&member(1), &room_id).await);
    assert_eq!(alpha_view.schedule.unwrap().when, kickoff);

    let err = system
        .lifecycle
        .update_schedule(&member(1), &room_id, kickoff, "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    system.settle_notifications().await;
    let to_alpha = system.gateway.messages_for(1);
    assert!(to_alpha
        .iter()
        .any(|n| n.kind == NotificationKind::ScheduleUpdated));
}

#[tokio::test]
async fn test_my_matches_lists_every_club_of_the_member() {
    let (system, room_id) = paired_system().await;

    let alpha_matches = assert_ok!(system.lifecycle.my_matches(&member(1)).await);
    assert_eq!(alpha_matches.len(), 1);
    assert_eq!(alpha_matches[0].room_id, room_id);
    assert_eq!(alpha_matches[0].opponent_club_id, 2);
    assert_eq!(alpha_matches[0].region, "Seoul/Gangnam");

    let nobody = assert_ok!(system.lifecycle.my_matches(&"stranger".to_string()).await);
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn test_finished_history_and_ranking() {
    let (system, room_id) = paired_system().await;
    system.add_club(3, "Gamma FC", mapo(), 1200).await;

    assert_ok!(system.lifecycle.propose_result(&admin(1), &room_id, 3, 1).await);
    assert_ok!(system.lifecycle.confirm_result(&admin(2), &room_id, true).await);

    let history = assert_ok!(system.lifecycle.finished_matches(1, None).await);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].opponent_name, "Beta FC");
    assert_eq!((history[0].my_score, history[0].op_score), (Some(3), Some(1)));
    assert_eq!(history[0].result, Some(GameResult::Win));
    assert_eq!(history[0].rating_change, Some(18));

    let beta_history = assert_ok!(system.lifecycle.finished_matches(2, Some(10)).await);
    assert_eq!(beta_history[0].rating_change, Some(-18));
    assert_eq!(beta_history[0].result, Some(GameResult::Loss));

    let err = system.lifecycle.finished_matches(99, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let seoul = assert_ok!(system.lifecycle.ranking("soccer", Some("Seoul"), None).await);
    let order: Vec<u64> = seoul.iter().map(|entry| entry.club_id).collect();
    assert_eq!(order, vec![3, 2, 1]);
    assert_eq!(seoul[2].wins, 1);

    let gangnam_only = assert_ok!(
        system
            .lifecycle
            .ranking("soccer", Some("Seoul"), Some("Gangnam"))
            .await
    );
    assert_eq!(gangnam_only.len(), 2);
    assert_eq!(gangnam_only[0].rank, 1);
}

#[tokio::test]
async fn test_region_granularity_is_configurable() {
    let strict = TestSystem::new();
    strict.add_club(1, "Alpha FC", gangnam(), 1000).await;
    strict.add_club(2, "Beta FC", mapo(), 1000).await;
    assert_ok!(strict.matchmaker.request_match(&admin(1), match_request(1, gangnam())).await);
    let outcome = assert_ok!(strict.matchmaker.request_match(&admin(2), match_request(2, mapo())).await);
    assert!(matches!(outcome, MatchOutcome::Waiting { .. }));

    let loose = TestSystem::with_settings(MatchmakingSettings {
        region_granularity: RegionGranularity::Primary,
        ..MatchmakingSettings::default()
    });
    loose.add_club(1, "Alpha FC", gangnam(), 1000).await;
    loose.add_club(2, "Beta FC", mapo(), 1000).await;
    assert_ok!(loose.matchmaker.request_match(&admin(1), match_request(1, gangnam())).await);
    let outcome = assert_ok!(loose.matchmaker.request_match(&admin(2), match_request(2, mapo())).await);
    assert!(matches!(outcome, MatchOutcome::Matched { opponent_club_id: 1, .. }));
}

#[tokio::test]
async fn test_oldest_waiting_club_is_paired_first() {
    let system = TestSystem::new();
    for (id, name) in [(1, "Alpha FC"), (2, "Beta FC"), (3, "Gamma FC")] {
        system.add_club(id, name, gangnam(), 1000).await;
    }

    // Alpha and Beta cannot play each other: Alpha weekdays only, Beta weekends only
    let mut weekday = match_request(1, gangnam());
    weekday.day_pref = Some("WEEKDAY".to_string());
    assert_ok!(system.matchmaker.request_match(&admin(1), weekday).await);
    assert_ok!(system.matchmaker.request_match(&admin(2), match_request(2, gangnam())).await);

    let mut any_day = match_request(3, gangnam());
    any_day.day_pref = None;
    let outcome = assert_ok!(system.matchmaker.request_match(&admin(3), any_day).await);
    assert!(matches!(outcome, MatchOutcome::Matched { opponent_club_id: 1, .. }));
}

#[tokio::test]
async fn test_lost_race_falls_back_to_waiting() {
    let inner = Arc::new(InMemoryMatchStore::new());
    let store = Arc::new(ContendedStore::new(inner.clone(), 1, 99));
    let system = TestSystem::with_store(store.clone(), MatchmakingSettings::default());
    system.add_club(1, "Alpha FC", gangnam(), 1000).await;
    system.add_club(2, "Beta FC", gangnam(), 1000).await;

    assert_ok!(system.matchmaker.request_match(&admin(1), match_request(1, gangnam())).await);

    // The rival takes Alpha's entry, so Beta finds nobody on the retry and waits
    let outcome = assert_ok!(system.matchmaker.request_match(&admin(2), match_request(2, gangnam())).await);
    assert!(matches!(outcome, MatchOutcome::Waiting { .. }));
    assert_eq!(store.steals(), 1);

    let stats = assert_ok!(system.store.stats().await);
    assert_eq!(stats.waiting_entries, 1);
    assert_eq!(stats.active_matches, 1);
}

#[tokio::test]
async fn test_lost_race_retries_with_next_candidate() {
    let inner = Arc::new(InMemoryMatchStore::new());
    let store = Arc::new(ContendedStore::new(inner, 1, 99));
    let system = TestSystem::with_store(store.clone(), MatchmakingSettings::default());
    for (id, name) in [(1, "Alpha FC"), (2, "Beta FC"), (3, "Gamma FC")] {
        system.add_club(id, name, gangnam(), 1000).await;
    }

    // Two waiting clubs that cannot play each other
    let mut weekday = match_request(1, gangnam());
    weekday.day_pref = Some("WEEKDAY".to_string());
    assert_ok!(system.matchmaker.request_match(&admin(1), weekday).await);
    assert_ok!(system.matchmaker.request_match(&admin(2), match_request(2, gangnam())).await);

    // Gamma loses Alpha to the rival, then pairs with Beta on the retry
    let mut any_day = match_request(3, gangnam());
    any_day.day_pref = None;
    let outcome = assert_ok!(system.matchmaker.request_match(&admin(3), any_day).await);
    assert!(matches!(outcome, MatchOutcome::Matched { opponent_club_id: 2, .. }));
    assert_eq!(store.steals(), 1);

    let stats = assert_ok!(system.store.stats().await);
    assert_eq!(stats.waiting_entries, 0);
    assert_eq!(stats.active_matches, 2);
}

#[tokio::test]
async fn test_second_lost_race_enqueues() {
    let inner = Arc::new(InMemoryMatchStore::new());
    let store = Arc::new(ContendedStore::new(inner, 2, 99));
    let system = TestSystem::with_store(store.clone(), MatchmakingSettings::default());
    for (id, name) in [(1, "Alpha FC"), (2, "Beta FC"), (3, "Gamma FC")] {
        system.add_club(id, name, gangnam(), 1000).await;
    }

    let mut weekday = match_request(1, gangnam());
    weekday.day_pref = Some("WEEKDAY".to_string());
    assert_ok!(system.matchmaker.request_match(&admin(1), weekday).await);
    assert_ok!(system.matchmaker.request_match(&admin(2), match_request(2, gangnam())).await);

    // Gamma loses Alpha, then Beta, and gives up searching
    let mut any_day = match_request(3, gangnam());
    any_day.day_pref = None;
    let outcome = assert_ok!(system.matchmaker.request_match(&admin(3), any_day).await);
    assert!(matches!(outcome, MatchOutcome::Waiting { .. }));
    assert_eq!(store.steals(), 2);

    let stats = assert_ok!(system.store.stats().await);
    assert_eq!(stats.waiting_entries, 1);
    assert_eq!(stats.active_matches, 2);
}

#[tokio::test]
async fn test_store_outage_surfaces_from_lifecycle() {
    let inner = Arc::new(InMemoryMatchStore::new());
    let system = TestSystem::with_store(inner.clone(), MatchmakingSettings::default());
    let room_id = pair_alpha_and_beta(&system).await;
    assert_ok!(system.lifecycle.propose_result(&admin(1), &room_id, 3, 1).await);

    inner.set_available(false);
    let err = system
        .lifecycle
        .confirm_result(&admin(2), &room_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    let err = system
        .lifecycle
        .propose_result(&admin(2), &room_id, 1, 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    let err = system
        .matchmaker
        .request_match(&admin(1), match_request(1, gangnam()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

    inner.set_available(true);
    let record = assert_ok!(system.store.get_match_by_room(&room_id).await);
    assert_eq!(record.status, MatchStatus::Pending);
    assert_eq!(system.club(1).await.rating, 1000);
    assert_eq!(system.club(2).await.rating, 1050);
}

#[tokio::test]
async fn test_failed_opponent_lookup_leaves_match_untouched() {
    let inner = Arc::new(InMemoryMatchStore::new());
    let store = Arc::new(ContendedStore::new(inner, 0, 99));
    let system = TestSystem::with_store(store.clone(), MatchmakingSettings::default());
    let room_id = pair_alpha_and_beta(&system).await;
    system.settle_notifications().await;

    store.fail_club_lookups(true);
    let err = system
        .lifecycle
        .propose_result(&admin(1), &room_id, 3, 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

    let kickoff = Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap();
    let err = system
        .lifecycle
        .update_schedule(&admin(1), &room_id, kickoff, "Jamsil Field 3")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    store.fail_club_lookups(false);

    // Neither write happened and nobody was told otherwise
    let record = assert_ok!(system.store.get_match_by_room(&room_id).await);
    assert_eq!(record.status, MatchStatus::Matched);
    assert!(record.proposal.is_none());
    assert!(record.schedule.is_none());

    system.settle_notifications().await;
    assert_eq!(system.gateway.count_of(NotificationKind::ResultProposed), 0);
    assert_eq!(system.gateway.count_of(NotificationKind::ScheduleUpdated), 0);
}
