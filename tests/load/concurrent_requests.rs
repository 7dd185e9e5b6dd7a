//! Concurrency stress tests for pairing and settlement
//!
//! Many clubs race for the same waiting entries; the store's compare-and-swap
//! must keep every entry in at most one match.

use crate::fixtures::{admin, gangnam, match_request, TestSystem};
use futures::future::join_all;
use matchday::types::{MatchOutcome, MatchStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_requests_against_one_waiting_entry() {
    let system = Arc::new(TestSystem::new());
    for (id, name) in [(1, "Alpha FC"), (2, "Beta FC"), (3, "Gamma FC")] {
        system.add_club(id, name, gangnam(), 1000).await;
    }

    system
        .matchmaker
        .request_match(&admin(1), match_request(1, gangnam()))
        .await
        .unwrap();

    let racers = [2u64, 3].map(|club_id| {
        let system = system.clone();
        tokio::spawn(async move {
            system
                .matchmaker
                .request_match(&admin(club_id), match_request(club_id, gangnam()))
                .await
        })
    });
    let outcomes: Vec<MatchOutcome> = join_all(racers)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    // One racer takes Alpha; the other either waits or pairs with the loser's new entry
    let with_alpha = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, MatchOutcome::Matched { opponent_club_id: 1, .. }))
        .count();
    assert_eq!(with_alpha, 1);

    let matches = system.store.get_matches_for_clubs(&[1]).await.unwrap();
    assert_eq!(matches.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_clubs_pair_without_double_booking() {
    const CLUBS: u64 = 40;

    let system = Arc::new(TestSystem::new());
    for id in 1..=CLUBS {
        system
            .add_club(id, &format!("Club {}", id), gangnam(), 1000 + (id as i32 % 5) * 10)
            .await;
    }

    let started = Instant::now();
    let requests = (1..=CLUBS).map(|club_id| {
        let system = system.clone();
        tokio::spawn(async move {
            system
                .matchmaker
                .request_match(&admin(club_id), match_request(club_id, gangnam()))
                .await
        })
    });
    let results = join_all(requests).await;
    let elapsed = started.elapsed();

    for joined in results {
        joined.unwrap().unwrap();
    }

    let club_ids: Vec<u64> = (1..=CLUBS).collect();
    let matches = system.store.get_matches_for_clubs(&club_ids).await.unwrap();

    let mut appearances: HashMap<u64, usize> = HashMap::new();
    for record in &matches {
        assert_ne!(record.home_club, record.away_club);
        assert_eq!(record.status, MatchStatus::Matched);
        *appearances.entry(record.home_club).or_default() += 1;
        *appearances.entry(record.away_club).or_default() += 1;
    }
    assert!(appearances.values().all(|count| *count == 1));

    let stats = system.store.stats().await.unwrap();
    assert_eq!(stats.waiting_entries + 2 * matches.len(), CLUBS as usize);

    println!(
        "Paired {} clubs into {} matches in {:?}",
        CLUBS,
        matches.len(),
        elapsed
    );
    assert!(elapsed < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_settle_once() {
    let system = Arc::new(TestSystem::new());
    system.add_club(1, "Alpha FC", gangnam(), 1000).await;
    system.add_club(2, "Beta FC", gangnam(), 1050).await;

    system
        .matchmaker
        .request_match(&admin(1), match_request(1, gangnam()))
        .await
        .unwrap();
    let room_id = match system
        .matchmaker
        .request_match(&admin(2), match_request(2, gangnam()))
        .await
        .unwrap()
    {
        MatchOutcome::Matched { room_id, .. } => room_id,
        other => panic!("expected a match, got {:?}", other),
    };
    system
        .lifecycle
        .propose_result(&admin(1), &room_id, 3, 1)
        .await
        .unwrap();

    let confirms = (0..10).map(|i| {
        let system = system.clone();
        let room_id = room_id.clone();
        let caller = if i % 2 == 0 { admin(1) } else { admin(2) };
        tokio::spawn(async move { system.lifecycle.confirm_result(&caller, &room_id, true).await })
    });

    let outcomes: Vec<_> = join_all(confirms)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let applied = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Ok(o) if !o.already_finished))
        .count();
    assert_eq!(applied, 1);

    // Losers either saw FINISHED or lost the version race
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert!(e.is_conflict(), "unexpected error: {}", e);
        }
    }

    assert_eq!(system.club(1).await.rating, 1018);
    assert_eq!(system.club(2).await.rating, 1032);

    let history = system.lifecycle.finished_matches(1, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rating_change, Some(18));
}
