//! End-to-end settlement against a real database (spec.md §4.4, §8).

mod common;

use std::time::Duration;

use serial_test::serial;
use wagerhall::db;
use wagerhall::db::model::SlipStatus;
use wagerhall::errors::AppError;
use wagerhall::settings::SettingsCache;
use wagerhall::settlement::{self, SettleOptions};
use wagerhall::validation::RawBetLine;
use wagerhall::{betting, money::Money};

fn settings_for(pool: &sqlx::PgPool) -> SettingsCache {
    SettingsCache::new(pool.clone(), Duration::from_secs(0))
}

#[tokio::test]
#[serial]
async fn single_bet_loses_to_the_lowest_untouched_card() {
    // spec.md §8 scenario 1.
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    common::set_setting(&pool, "game_result_type", "auto").await;
    common::set_setting(&pool, "winning_card_policy", "lowest_loss").await;
    common::set_setting(&pool, "card_count", "12").await;
    common::set_setting(&pool, "auto_claim", "false").await;

    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(50),
        "10.00",
    )
    .await;

    let lines = vec![RawBetLine { card_number: 7, amount: Money::parse("10.00").unwrap() }];
    betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let mut tx = pool.begin().await.unwrap();
    db::rounds::set_lifecycle(&mut tx, &round_id, db::model::RoundLifecycle::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let report = settlement::settle_round(&pool, &settings, &round_id, SettleOptions::default())
        .await
        .expect("settlement succeeds");

    assert_eq!(report.winning_card, 1);
    assert_eq!(report.winning_slip_count, 0);
    assert_eq!(report.losing_slip_count, 1);

    let balance = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.to_string(), "90.00");
}

#[tokio::test]
#[serial]
async fn lowest_loss_tie_breaks_to_lowest_card_number() {
    // spec.md §8 scenario 2.
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    common::set_setting(&pool, "game_result_type", "auto").await;
    common::set_setting(&pool, "winning_card_policy", "lowest_loss").await;
    common::set_setting(&pool, "card_count", "12").await;
    common::set_setting(&pool, "auto_claim", "false").await;

    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(50),
        "10.00",
    )
    .await;

    let lines = vec![
        RawBetLine { card_number: 3, amount: Money::parse("5.00").unwrap() },
        RawBetLine { card_number: 9, amount: Money::parse("5.00").unwrap() },
    ];
    betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let mut tx = pool.begin().await.unwrap();
    db::rounds::set_lifecycle(&mut tx, &round_id, db::model::RoundLifecycle::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let report = settlement::settle_round(&pool, &settings, &round_id, SettleOptions::default())
        .await
        .expect("settlement succeeds");

    assert_eq!(report.winning_card, 1);
}

#[tokio::test]
#[serial]
async fn auto_claim_credits_winning_slips_during_settlement() {
    // spec.md §8 scenario 3.
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    common::set_setting(&pool, "game_result_type", "auto").await;
    common::set_setting(&pool, "winning_card_policy", "lowest_loss").await;
    common::set_setting(&pool, "card_count", "12").await;
    common::set_setting(&pool, "auto_claim", "true").await;

    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(50),
        "10.00",
    )
    .await;

    let lines = vec![
        RawBetLine { card_number: 7, amount: Money::parse("10.00").unwrap() },
        RawBetLine { card_number: 1, amount: Money::parse("1.00").unwrap() },
    ];
    betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let mut tx = pool.begin().await.unwrap();
    db::rounds::set_lifecycle(&mut tx, &round_id, db::model::RoundLifecycle::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let report = settlement::settle_round(&pool, &settings, &round_id, SettleOptions::default())
        .await
        .expect("settlement succeeds");

    assert_eq!(report.winning_card, 2);
    // Neither line was placed on card 2, so the slip still loses overall
    // (spec.md §8 scenario 3: "bet on card 1 loses; slip status lost").
    assert_eq!(report.winning_slip_count, 0);
    assert_eq!(report.losing_slip_count, 1);

    // Balance started at 100, debited 11 for both lines; no line won, so
    // auto-claim has nothing to credit back.
    let balance = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.to_string(), "89.00");

    let slips = {
        let mut tx = pool.begin().await.unwrap();
        let slips = db::slips::slips_for_round(&mut tx, &round_id).await.unwrap();
        tx.rollback().await.ok();
        slips
    };
    assert_eq!(slips.len(), 1);
    assert_eq!(slips[0].status, SlipStatus::Lost);
    assert!(!slips[0].claimed);
}

#[tokio::test]
#[serial]
async fn manual_game_result_type_awaits_admin_decision() {
    // spec.md §8 scenario 7.
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    common::set_setting(&pool, "game_result_type", "manual").await;
    common::set_setting(&pool, "card_count", "12").await;

    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(50),
        "10.00",
    )
    .await;

    let lines = vec![RawBetLine { card_number: 4, amount: Money::parse("10.00").unwrap() }];
    betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let mut tx = pool.begin().await.unwrap();
    db::rounds::set_lifecycle(&mut tx, &round_id, db::model::RoundLifecycle::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let err = settlement::settle_round(&pool, &settings, &round_id, SettleOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AwaitingManual));

    // The round must be back to `not_settled` so a later admin call can
    // re-enter it, rather than stuck `settling`.
    let round = db::rounds::get(&pool, &round_id).await.unwrap();
    assert_eq!(round.settlement_status, db::model::SettlementStatus::NotSettled);

    let report = settlement::settle_round(
        &pool,
        &settings,
        &round_id,
        SettleOptions { winning_card: Some(4), initiator: Some(wagerhall::settlement::Initiator::Admin) },
    )
    .await
    .expect("admin settlement succeeds");

    assert_eq!(report.winning_card, 4);
    assert_eq!(report.winning_slip_count, 1);
}

#[tokio::test]
#[serial]
async fn settling_an_already_settled_round_is_a_no_op() {
    // spec.md §8 property R1.
    let pool = common::test_pool().await;
    let settings = settings_for(&pool);
    common::set_setting(&pool, "game_result_type", "auto").await;
    common::set_setting(&pool, "winning_card_policy", "lowest_loss").await;
    common::set_setting(&pool, "card_count", "12").await;
    common::set_setting(&pool, "auto_claim", "false").await;

    let user_id = common::seed_user(&pool, "100.00").await;
    let round_id = format!("RND-TEST-{}", uuid::Uuid::new_v4());
    let now = chrono::Utc::now();
    common::seed_round(
        &pool,
        &round_id,
        now - chrono::Duration::seconds(250),
        now + chrono::Duration::seconds(50),
        "10.00",
    )
    .await;

    let lines = vec![RawBetLine { card_number: 7, amount: Money::parse("10.00").unwrap() }];
    betting::place_bet(&pool, &settings, user_id, &round_id, &lines, None)
        .await
        .expect("bet placed");

    let mut tx = pool.begin().await.unwrap();
    db::rounds::set_lifecycle(&mut tx, &round_id, db::model::RoundLifecycle::Completed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let first = settlement::settle_round(&pool, &settings, &round_id, SettleOptions::default())
        .await
        .expect("first settlement succeeds");
    let second = settlement::settle_round(&pool, &settings, &round_id, SettleOptions::default())
        .await
        .expect("re-entry is a no-op, not an error");

    assert_eq!(first, second);

    // No duplicate ledger credit for the (losing) slip's user; balance
    // reflects exactly one debit.
    let balance = db::users::get_balance(&pool, user_id).await.unwrap();
    assert_eq!(balance.to_string(), "90.00");
}
