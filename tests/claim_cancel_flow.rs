//! End-to-end claim and cancel flows against a real database (spec.md §4.6, §8).

mod common;

use std::time::Duration;

use serial_test::serial;
use wagerhall::db;
use wagerhall::errors::AppError;
use wagerhall::settings::SettingsCache;
use wagerhall::settlement::{self, SettleOptions};
use wagerhall::validation::{RawBetLine, SlipIdentifier};
use wagerhall::{betting, claim, money::Money};

fn settings_for(pool: &sqlx::PgPool) -> SettingsCache {
    SettingsCache::new(pool.clone(), Duration::from_secs(0))
}

async fn place_and_settle_as_winner(
    pool: &sqlx::PgPool,
    settings: &SettingsCache,
    user_id: uuid::Uuid,
) -> (uuid::Uuid, String) {
    common::set_setting(pool, "game_result_type", "manual").await;
    common::set_setting(pool, "card_count", "12").await;
    common::set_setting(pool, "auto_claim", "false").await;

    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    common::seed_round(
        pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(50),
        "10.00",
    )
    .await;

    let lines = vec![RawBetLine { card_number: 5, amount: Money::parse("10.00").unwrap() }];
    let placed = betting::place_bet(pool, settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let mut tx = pool.begin().await.unwrap();
    db::rounds::set_lifecycle(&mut tx, &round_id, db::model::RoundLifecycle::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    settlement::settle_round(
        pool,
        settings,
        &round_id,
        SettleOptions { winning_card: Some(5), initiator: None },
    )
    .await
    .expect("admin settlement names card 5 the winner");

    (placed.slip.slip_id, round_id)
}

#[tokio::test]
#[serial]
async fn claim_pays_out_once_then_refuses_a_second_claim() {
    // spec.md §8 scenario 6.
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "100.00").await;

    let (slip_id, _round_id) = place_and_settle_as_winner(&pool, &settings, user_id).await;

    let balance_before_claim = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance_before_claim.to_string(), "90.00");

    let outcome = claim::claim(&pool, user_id, &SlipIdentifier::SlipId(slip_id))
        .await
        .expect("first claim succeeds");
    assert_eq!(outcome.amount.to_string(), "100.00");
    assert_eq!(outcome.new_balance.to_string(), "190.00");

    let second = claim::claim(&pool, user_id, &SlipIdentifier::SlipId(slip_id))
        .await
        .unwrap_err();
    assert!(matches!(second, AppError::AlreadyClaimed));

    let balance_after_second = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance_after_second.to_string(), "190.00");
}

#[tokio::test]
#[serial]
async fn claim_rejects_a_caller_who_does_not_own_the_slip() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let owner = common::seed_user(&pool, "100.00").await;
    let stranger = common::seed_user(&pool, "0.00").await;

    let (slip_id, _round_id) = place_and_settle_as_winner(&pool, &settings, owner).await;

    let err = claim::claim(&pool, stranger, &SlipIdentifier::SlipId(slip_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
#[serial]
async fn cancel_refunds_a_pending_slip_and_reverses_the_card_total() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "100.00").await;
    common::set_setting(&pool, "cancel_cutoff_seconds", "10").await;

    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    // Plenty of headroom before the cutoff (end_time - 10s).
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(5),
        now + chrono::Duration::seconds(300),
        "10.00",
    )
    .await;

    let lines = vec![RawBetLine { card_number: 2, amount: Money::parse("15.00").unwrap() }];
    let placed = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let balance_after_bet = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance_after_bet.to_string(), "85.00");

    let refund = claim::cancel(&pool, &settings, user_id, placed.slip.slip_id)
        .await
        .expect("cancel succeeds within the active window");
    assert_eq!(refund.to_string(), "15.00");

    let balance_after_cancel = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance_after_cancel.to_string(), "100.00");

    let totals = db::slips::card_totals(&pool, &round_id).await.unwrap();
    let card_two_total = totals
        .iter()
        .find(|t| t.card_number == 2)
        .map(|t| t.total_amount.to_string())
        .unwrap_or_else(|| "0".to_string());
    assert_eq!(card_two_total, "0.00");

    // A repeat cancel on the same (now-cancelled) slip must be refused.
    let err = claim::cancel(&pool, &settings, user_id, placed.slip.slip_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotCancellable));
}

#[tokio::test]
#[serial]
async fn cancel_is_refused_once_the_round_is_inside_its_cutoff_window() {
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    let user_id = common::seed_user(&pool, "100.00").await;
    common::set_setting(&pool, "cancel_cutoff_seconds", "10").await;

    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    // end_time is only 5s out, inside the 10s cutoff window already.
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(5),
        "10.00",
    )
    .await;

    let lines = vec![RawBetLine { card_number: 2, amount: Money::parse("10.00").unwrap() }];
    let placed = betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let err = claim::cancel(&pool, &settings, user_id, placed.slip.slip_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotCancellable));
}
