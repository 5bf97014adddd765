//! End-to-end bet placement against a real database (spec.md §4.5, §8).

mod common;

use std::time::Duration;

use chrono::Utc;
use serial_test::serial;
use wagerhall::errors::AppError;
use wagerhall::settings::SettingsCache;
use wagerhall::validation::RawBetLine;
use wagerhall::{betting, money::Money};

fn settings_for(pool: &sqlx::PgPool) -> SettingsCache {
    // Zero TTL so every test reads its own freshly-seeded settings rather
    // than a value cached by an earlier test in the same process.
    SettingsCache::new(pool.clone(), Duration::from_secs(0))
}

#[tokio::test]
#[serial]
async fn places_a_bet_and_debits_the_wallet() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = Utc::now();
    common::seed_round(&pool, &round_id, now - chrono::Duration::seconds(5), now + chrono::Duration::seconds(300), "10.00").await;

    let lines = vec![RawBetLine { card_number: 3, amount: Money::parse("20.00").unwrap() }];
    let placed = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placement succeeds");

    assert_eq!(placed.slip.total_amount.to_string(), "20.00");
    assert_eq!(placed.details.len(), 1);

    let balance = wagerhall::db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.to_string(), "80.00");
}

#[tokio::test]
#[serial]
async fn replaying_an_idempotency_key_returns_the_original_slip() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "50.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = Utc::now();
    common::seed_round(&pool, &round_id, now - chrono::Duration::seconds(5), now + chrono::Duration::seconds(300), "10.00").await;

    let lines = vec![RawBetLine { card_number: 1, amount: Money::parse("5.00").unwrap() }];
    let key = "replay-key-1";

    let first = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, Some(key))
        .await
        .expect("first placement succeeds");
    let second = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, Some(key))
        .await
        .expect("replay returns the existing slip instead of erroring");

    assert_eq!(first.slip.slip_id, second.slip.slip_id);

    // Only the first call should have moved money.
    let balance = wagerhall::db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.to_string(), "45.00");
}

#[tokio::test]
#[serial]
async fn rejects_a_card_number_outside_the_configured_card_count() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    common::set_setting(&pool, "card_count", "12").await;
    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = Utc::now();
    common::seed_round(&pool, &round_id, now - chrono::Duration::seconds(5), now + chrono::Duration::seconds(300), "10.00").await;

    let lines = vec![RawBetLine { card_number: 13, amount: Money::parse("5.00").unwrap() }];
    let err = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn rejects_a_bet_that_would_overdraw_the_wallet() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "5.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = Utc::now();
    common::seed_round(&pool, &round_id, now - chrono::Duration::seconds(5), now + chrono::Duration::seconds(300), "10.00").await;

    let lines = vec![RawBetLine { card_number: 1, amount: Money::parse("10.00").unwrap() }];
    let err = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientFunds));
}

#[tokio::test]
#[serial]
async fn rejects_bets_once_the_round_has_closed() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = Utc::now();
    // Round already ended.
    common::seed_round(&pool, &round_id, now - chrono::Duration::seconds(300), now - chrono::Duration::seconds(1), "10.00").await;

    let lines = vec![RawBetLine { card_number: 1, amount: Money::parse("5.00").unwrap() }];
    let err = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::RoundClosed));
}
