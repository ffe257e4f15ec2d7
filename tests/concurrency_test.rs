//! Concurrent writers against a file-backed SQLite pool.
//!
//! Lost races must surface as conflicts or no-ops, never as double rewards.

mod common;

use std::future::Future;
use std::sync::Arc;

use common::{at, day, Harness};
use futures::future::join_all;
use questline::domain::models::{
    AssignmentStatus, DailyMissionTemplate, MissionParticipation, MissionType, NotificationKind, ParticipationStatus,
    User,
};
use questline::domain::ports::{DailyMissionRepository, ParticipationRepository};
use questline::ErrorKind;
use serde_json::json;

/// Spawn every future onto the runtime and wait for all of them.
async fn race<T, Fut>(futures: impl IntoIterator<Item = Fut>) -> Vec<T>
where
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assignment_yields_one_set() {
    common::setup_test_logging();
    let h = Harness::on_disk().await;
    let user = h.user(User::new("Race", "010")).await;
    for i in 0..10 {
        h.engine
            .add_mission_template(DailyMissionTemplate::new(format!("T{i}")).with_weight(1.0))
            .await
            .unwrap();
    }

    let results = race((0..8).map(|_| {
        let engine = Arc::clone(&h.engine);
        async move { engine.assign_daily_missions(user.id, day(2024, 9, 1)).await }
    }))
    .await;

    let stored = h.store.list_assignments(user.id, day(2024, 9, 1)).await.unwrap();
    assert_eq!(stored.len(), 5);
    for result in results {
        assert_eq!(result.unwrap(), stored, "every caller sees the winning set");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_completion_pays_once() {
    let h = Harness::on_disk().await;
    let user = h.user(User::new("Race", "010")).await;
    h.engine
        .add_mission_template(DailyMissionTemplate::new("Only").with_rewards(10, 3))
        .await
        .unwrap();
    let now = at(2024, 9, 1, 12);
    let set = h.engine.assign_daily_missions(user.id, now.date_naive()).await.unwrap();
    let assignment_id = set[0].id;

    let results = race((0..6).map(|_| {
        let engine = Arc::clone(&h.engine);
        async move {
            engine
                .complete_daily_mission_at(user.id, assignment_id, json!({}), now)
                .await
        }
    }))
    .await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.kind(), ErrorKind::Conflict | ErrorKind::Validation),
            "unexpected error: {err}"
        );
    }

    let stored = h.reload(user.id).await;
    assert_eq!(stored.experience_points, 10 + 100);
    assert_eq!(stored.coins, 3);
    assert_eq!(h.ledger.ledger_totals(user.id).await.unwrap(), (110, 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_skip_racing_completion_charges_only_a_real_skip() {
    let h = Harness::on_disk().await;
    let user = h.user(User::new("Race", "010").with_coins(500)).await;
    h.engine
        .add_mission_template(DailyMissionTemplate::new("Only").with_rewards(10, 3))
        .await
        .unwrap();
    let now = at(2024, 9, 1, 12);
    let set = h.engine.assign_daily_missions(user.id, now.date_naive()).await.unwrap();
    let assignment_id = set[0].id;

    let results = race((0..6).map(|i| {
        let engine = Arc::clone(&h.engine);
        async move {
            if i % 2 == 0 {
                engine.skip_daily_mission(user.id, assignment_id).await.map(|_| "skip")
            } else {
                engine
                    .complete_daily_mission_at(user.id, assignment_id, json!({}), now)
                    .await
                    .map(|_| "complete")
            }
        }
    }))
    .await;

    let winners: Vec<&str> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(winners.len(), 1, "exactly one action applies: {winners:?}");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.kind(), ErrorKind::Conflict | ErrorKind::Validation),
            "unexpected error: {err}"
        );
    }

    let stored = h.reload(user.id).await;
    let assignment = h.store.get_assignment(assignment_id).await.unwrap().unwrap();
    match winners[0] {
        "skip" => {
            assert_eq!(assignment.status, AssignmentStatus::Skipped);
            assert_eq!(stored.coins, 400);
            assert_eq!(stored.experience_points, 0);
        }
        _ => {
            assert_eq!(assignment.status, AssignmentStatus::Completed);
            assert_eq!(stored.coins, 503, "a lost skip must not keep the coins");
            assert_eq!(stored.experience_points, 110);
        }
    }
    let (_, coin_movements) = h.ledger.ledger_totals(user.id).await.unwrap();
    assert_eq!(coin_movements, stored.coins - 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_check_ins_count_once() {
    let h = Harness::on_disk().await;
    let user = h.user(User::new("Race", "010").with_streak(6, day(2024, 9, 1))).await;
    let now = at(2024, 9, 2, 8);

    let results = race((0..6).map(|_| {
        let engine = Arc::clone(&h.engine);
        async move { engine.check_in_at(user.id, now).await }
    }))
    .await;

    let fresh = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|o| !o.result.already_checked_in)
        .count();
    assert_eq!(fresh, 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::Conflict, "unexpected error: {err}");
    }

    let stored = h.reload(user.id).await;
    assert_eq!(stored.consecutive_days, 7);
    assert_eq!(stored.experience_points, 70);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verification_completes_mission_once() {
    let h = Harness::on_disk().await;
    let referrer = h.user(User::new("Host", "010-0000-0000")).await;
    let participation = MissionParticipation::new(referrer.id, MissionType::Referral)
        .with_status(ParticipationStatus::InProgress);
    h.store.create_participation(&participation).await.unwrap();

    let phones: Vec<String> = (0..8).map(|i| format!("010-3333-{i:04}")).collect();
    for (i, phone) in phones.iter().enumerate() {
        h.engine.submit_referral(referrer.id, &format!("F{i}"), phone).await.unwrap();
    }
    for phone in &phones[..3] {
        h.engine.register_referee(phone).await.unwrap();
    }

    // The remaining five phones register at once, each one twice.
    let late: Vec<String> = phones[3..].iter().chain(phones[3..].iter()).cloned().collect();
    let results = race(late.into_iter().map(|phone| {
        let engine = Arc::clone(&h.engine);
        async move { engine.register_referee(&phone).await }
    }))
    .await;

    let mut newly_verified = 0;
    for result in results {
        match result {
            Ok(outcome) => newly_verified += outcome.result.newly_verified,
            Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict, "unexpected error: {err}"),
        }
    }
    assert_eq!(newly_verified, 5, "each referral flips exactly once");

    let completed = h.store.get_participation(participation.id).await.unwrap().unwrap();
    assert_eq!(completed.status, ParticipationStatus::Completed);

    let completions = h
        .ledger
        .list_notifications(referrer.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::MissionCompleted)
        .count();
    assert_eq!(completions, 1);
}
