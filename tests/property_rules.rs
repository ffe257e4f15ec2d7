//! Property tests for progress, sampling, streak and level arithmetic.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use questline::adapters::memory::InMemoryStore;
use questline::domain::models::{
    apply_experience, level_for_experience, normalize_phone, scaled_progress, Badge,
    BadgeCondition, RulesConfig, User,
};
use questline::domain::ports::{ActivityRepository, BadgeRepository, UserRepository};
use questline::services::{next_streak, sample_with, BadgeEvaluator};
use questline::{ActivityEvent, EventKind};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

fn expected_progress(count: u32, threshold: u32) -> f64 {
    (100.0 * f64::from(count) / f64::from(threshold)).min(100.0)
}

proptest! {
    /// Stored count progress tracks min(100, 100 × count / threshold) and never drops.
    #[test]
    fn prop_count_progress_is_monotonic(threshold in 1u32..12, events in 0u32..20) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let user = User::new("Prop", "010");
            store.create_user(&user).await.unwrap();
            let badge = Badge::new("Counter", BadgeCondition::count(EventKind::PostCreated, threshold));
            store.create_badge(&badge).await.unwrap();
            let evaluator = BadgeEvaluator::new(store.clone(), store.clone(), RulesConfig::default());

            let mut last = 0.0;
            for count in 1..=events {
                store.record_event(&ActivityEvent::new(user.id, EventKind::PostCreated)).await.unwrap();
                let evaluation = evaluator.evaluate(user.id, &badge).await.unwrap();

                let expected = expected_progress(count, threshold);
                prop_assert!((evaluation.progress - expected).abs() < 1e-9);
                prop_assert!(evaluation.progress >= last);
                prop_assert_eq!(evaluation.unlocked, count >= threshold);
                last = evaluation.progress;
            }
            Ok(())
        })?;
    }

    #[test]
    fn prop_scaled_progress_bounds(value in 0.0f64..1_000.0, threshold in 1u32..500) {
        let p = scaled_progress(value, threshold);
        prop_assert!((0.0..=100.0).contains(&p));
        if value >= f64::from(threshold) {
            prop_assert!((p - 100.0).abs() < f64::EPSILON);
        }
    }

    /// Sampling returns min(k, n) distinct members of the pool.
    #[test]
    fn prop_sample_is_subset_without_repeats(
        weights in prop::collection::vec(-5.0f64..50.0, 0..30),
        k in 0usize..40,
        seed in any::<u64>(),
    ) {
        let mut rng = Mcg128Xsl64::seed_from_u64(seed);
        let pool: Vec<usize> = (0..weights.len()).collect();
        let picked = sample_with(&mut rng, pool, k, |i| weights[*i]);

        prop_assert_eq!(picked.len(), k.min(weights.len()));
        let mut unique = picked.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), picked.len());
        prop_assert!(picked.iter().all(|i| *i < weights.len()));
    }

    #[test]
    fn prop_next_streak(days in 0u32..500, gap in -3i64..10) {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let last = today - Duration::days(gap);
        let next = next_streak(Some(last), days, today);
        match gap {
            g if g <= 0 => prop_assert_eq!(next, None),
            1 => prop_assert_eq!(next, Some(days + 1)),
            _ => prop_assert_eq!(next, Some(1)),
        }
    }

    /// Level always matches total XP, and each bonus level pays at most once.
    #[test]
    fn prop_experience_levels(start in 0i64..3_000, amount in 0u32..2_000) {
        let change = apply_experience(start, amount);
        prop_assert!(change.total_xp >= start + i64::from(amount));
        prop_assert_eq!(change.new_level, level_for_experience(change.total_xp));
        prop_assert!(change.new_level >= change.old_level);

        let mut levels: Vec<u32> = change.bonuses.iter().map(|(level, _)| *level).collect();
        let before = levels.len();
        levels.dedup();
        prop_assert_eq!(levels.len(), before);
        prop_assert!(levels.iter().all(|l| *l > change.old_level && *l <= change.new_level));
    }

    #[test]
    fn prop_phone_normalization_is_idempotent(raw in "[0-9 +()-]{0,20}") {
        let once = normalize_phone(&raw);
        prop_assert!(once.chars().all(|c| c.is_ascii_digit()));
        prop_assert_eq!(normalize_phone(&once), once);
    }
}

/// Over many single draws, selection frequency approaches wᵢ / ΣW.
#[test]
fn test_sampling_frequency_follows_weights() {
    let weights = [1.0, 2.0, 3.0, 4.0];
    let total: f64 = weights.iter().sum();
    let trials = 40_000;
    let mut rng = Mcg128Xsl64::seed_from_u64(7);
    let mut hits = [0u32; 4];

    for _ in 0..trials {
        let picked = sample_with(&mut rng, vec![0usize, 1, 2, 3], 1, |i| weights[*i]);
        hits[picked[0]] += 1;
    }

    for (i, w) in weights.iter().enumerate() {
        let observed = f64::from(hits[i]) / f64::from(trials);
        let expected = w / total;
        assert!(
            (observed - expected).abs() < 0.015,
            "template {i}: observed {observed:.3}, expected {expected:.3}"
        );
    }
}
