//! Typed data access for `rounds`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use super::model::{RoundLifecycle, RoundRow, SettlementStatus};
use crate::errors::{AppError, AppResult};

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    payout_multiplier: Decimal,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO rounds (round_id, start_time, end_time, lifecycle_state, settlement_status, payout_multiplier)
         VALUES ($1, $2, $3, 'pending', 'not_settled', $4)
         ON CONFLICT (round_id) DO NOTHING",
    )
    .bind(round_id)
    .bind(start_time)
    .bind(end_time)
    .bind(payout_multiplier)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get(pool: &PgPool, round_id: &str) -> AppResult<RoundRow> {
    fetch_one(pool, round_id).await
}

async fn fetch_one(pool: &PgPool, round_id: &str) -> AppResult<RoundRow> {
    sqlx::query_as::<_, RoundRow>("SELECT * FROM rounds WHERE round_id = $1")
        .bind(round_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("round {round_id}")))
}

/// Lock the round row `FOR UPDATE`, for lifecycle/settlement transitions
/// and for the bet-placement precondition check.
pub async fn lock(tx: &mut Transaction<'_, Postgres>, round_id: &str) -> AppResult<RoundRow> {
    sqlx::query_as::<_, RoundRow>("SELECT * FROM rounds WHERE round_id = $1 FOR UPDATE")
        .bind(round_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("round {round_id}")))
}

pub async fn set_lifecycle(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
    state: RoundLifecycle,
) -> AppResult<()> {
    sqlx::query("UPDATE rounds SET lifecycle_state = $1 WHERE round_id = $2")
        .bind(state)
        .bind(round_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The settlement gate: atomically move `not_settled -> settling` and
/// stamp `settlement_started_at`. Returns `false` if the round was not in
/// `not_settled` state (another caller is ahead, or it is already settled).
pub async fn try_begin_settling(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE rounds SET settlement_status = 'settling', settlement_started_at = $2
         WHERE round_id = $1 AND settlement_status = 'not_settled'",
    )
    .bind(round_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn revert_to_not_settled(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE rounds SET settlement_status = 'not_settled', settlement_started_at = NULL
         WHERE round_id = $1",
    )
    .bind(round_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn mark_settled(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
    winning_card: i32,
    completed_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE rounds
         SET settlement_status = 'settled', winning_card = $2, settlement_completed_at = $3
         WHERE round_id = $1",
    )
    .bind(round_id)
    .bind(winning_card)
    .bind(completed_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
    error: &str,
) -> AppResult<()> {
    sqlx::query("UPDATE rounds SET settlement_status = 'failed', settlement_error = $2 WHERE round_id = $1")
        .bind(round_id)
        .bind(error)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Rounds currently `pending` or `active` (at most one should exist at a
/// time, but recovery tolerates more and reconciles them).
pub async fn find_open(pool: &PgPool) -> AppResult<Vec<RoundRow>> {
    let rows = sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM rounds WHERE lifecycle_state IN ('pending', 'active') ORDER BY start_time ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rounds past `end_time` that have not yet flipped to `completed`.
pub async fn find_overdue_active(pool: &PgPool, now: DateTime<Utc>) -> AppResult<Vec<RoundRow>> {
    let rows = sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM rounds WHERE lifecycle_state <> 'completed' AND end_time < $1",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rounds that should flip `pending -> active`.
pub async fn find_ready_to_activate(pool: &PgPool, now: DateTime<Utc>) -> AppResult<Vec<RoundRow>> {
    let rows = sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM rounds WHERE lifecycle_state = 'pending' AND start_time <= $1 AND end_time >= $1",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Completed rounds still awaiting settlement, older than `grace`. Backs
/// the periodic settlement sweep (the redundant trigger in spec.md §4.7).
/// Only `not_settled` rounds are matched here; a `failed` round must first
/// pass back through [`revert_to_not_settled`] (see
/// `Scheduler::retry_failed_settlements`) before the sweep will pick it up
/// again, per spec.md §9's "an admin or the recovery path may re-enter
/// (which first resets to not_settled)".
pub async fn find_due_for_settlement_sweep(
    pool: &PgPool,
    now: DateTime<Utc>,
    grace_seconds: i64,
) -> AppResult<Vec<RoundRow>> {
    let cutoff = now - chrono::Duration::seconds(grace_seconds);
    let rows = sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM rounds
         WHERE lifecycle_state = 'completed'
           AND settlement_status = 'not_settled'
           AND end_time <= $1",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Completed rounds stuck `failed`. The scheduler's recovery path re-enters
/// these by reverting to `not_settled` first; the next sweep tick then
/// retries settlement (spec.md §4.7 "Failure semantics").
pub async fn find_failed(pool: &PgPool) -> AppResult<Vec<RoundRow>> {
    let rows = sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM rounds WHERE settlement_status = 'failed'",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rounds stuck `settling` past the stuck-threshold; recovery reverts
/// these to `not_settled` (spec.md §4.7 "Recovery").
pub async fn find_stuck_settling(
    pool: &PgPool,
    now: DateTime<Utc>,
    stuck_threshold_seconds: i64,
) -> AppResult<Vec<RoundRow>> {
    let cutoff = now - chrono::Duration::seconds(stuck_threshold_seconds);
    let rows = sqlx::query_as::<_, RoundRow>(
        "SELECT * FROM rounds WHERE settlement_status = 'settling' AND settlement_started_at < $1",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn latest(pool: &PgPool) -> AppResult<Option<RoundRow>> {
    let row = sqlx::query_as::<_, RoundRow>("SELECT * FROM rounds ORDER BY start_time DESC LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub fn is_settled(status: SettlementStatus) -> bool {
    matches!(status, SettlementStatus::Settled)
}
