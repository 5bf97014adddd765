//! Typed data access for `bet_slips`, `bet_details`, and `round_card_totals`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::model::{BetDetailRow, BetSlipRow, RoundCardTotalRow, SlipStatus};
use crate::errors::{AppError, AppResult};

pub struct NewLine {
    pub card_number: i32,
    pub bet_amount: Decimal,
}

/// Whether a failed `insert_slip` lost a race against another committed
/// insert under the same `(user_id, idempotency_key)` (spec.md §8 scenario 4).
pub fn is_idempotency_key_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.constraint() == Some("uq_bet_slips_idempotency_key"))
        .unwrap_or(false)
}

pub async fn find_by_idempotency_key(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    key: &str,
) -> AppResult<Option<BetSlipRow>> {
    let row = sqlx::query_as::<_, BetSlipRow>(
        "SELECT * FROM bet_slips WHERE idempotency_key = $1 AND user_id = $2",
    )
    .bind(key)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row)
}

/// Whether the idempotency key is already used by a *different* user
/// (spec.md §4.5 step 1's `CONFLICT` branch).
pub async fn idempotency_key_used_by_other(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    key: &str,
) -> AppResult<bool> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT user_id FROM bet_slips WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&mut **tx)
            .await?;
    Ok(matches!(row, Some((owner,)) if owner != user_id))
}

pub async fn barcode_exists(tx: &mut Transaction<'_, Postgres>, barcode: &str) -> AppResult<bool> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM bet_slips WHERE barcode = $1")
        .bind(barcode)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.is_some())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_slip(
    tx: &mut Transaction<'_, Postgres>,
    slip_id: Uuid,
    user_id: Uuid,
    round_id: &str,
    total_amount: Decimal,
    barcode: &str,
    idempotency_key: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO bet_slips (slip_id, user_id, round_id, total_amount, barcode, status, idempotency_key)
         VALUES ($1, $2, $3, $4, $5, 'pending', $6)",
    )
    .bind(slip_id)
    .bind(user_id)
    .bind(round_id)
    .bind(total_amount)
    .bind(barcode)
    .bind(idempotency_key)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn insert_detail(
    tx: &mut Transaction<'_, Postgres>,
    slip_id: Uuid,
    round_id: &str,
    user_id: Uuid,
    line: &NewLine,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO bet_details (slip_id, round_id, user_id, card_number, bet_amount)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(slip_id)
    .bind(round_id)
    .bind(user_id)
    .bind(line.card_number)
    .bind(line.bet_amount)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_card_total(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
    card_number: i32,
    delta: Decimal,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO round_card_totals (round_id, card_number, total_amount)
         VALUES ($1, $2, $3)
         ON CONFLICT (round_id, card_number)
         DO UPDATE SET total_amount = round_card_totals.total_amount + EXCLUDED.total_amount",
    )
    .bind(round_id)
    .bind(card_number)
    .bind(delta)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn card_totals(pool: &PgPool, round_id: &str) -> AppResult<Vec<RoundCardTotalRow>> {
    let rows = sqlx::query_as::<_, RoundCardTotalRow>(
        "SELECT * FROM round_card_totals WHERE round_id = $1 ORDER BY card_number ASC",
    )
    .bind(round_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn card_totals_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
) -> AppResult<Vec<RoundCardTotalRow>> {
    let rows = sqlx::query_as::<_, RoundCardTotalRow>(
        "SELECT * FROM round_card_totals WHERE round_id = $1 ORDER BY card_number ASC",
    )
    .bind(round_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

pub async fn slips_for_round(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
) -> AppResult<Vec<BetSlipRow>> {
    let rows = sqlx::query_as::<_, BetSlipRow>(
        "SELECT * FROM bet_slips WHERE round_id = $1 ORDER BY created_at ASC",
    )
    .bind(round_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

pub async fn details_for_slip(
    tx: &mut Transaction<'_, Postgres>,
    slip_id: Uuid,
) -> AppResult<Vec<BetDetailRow>> {
    let rows =
        sqlx::query_as::<_, BetDetailRow>("SELECT * FROM bet_details WHERE slip_id = $1 ORDER BY id ASC")
            .bind(slip_id)
            .fetch_all(&mut **tx)
            .await?;
    Ok(rows)
}

pub async fn details_for_round(
    tx: &mut Transaction<'_, Postgres>,
    round_id: &str,
) -> AppResult<Vec<BetDetailRow>> {
    let rows = sqlx::query_as::<_, BetDetailRow>(
        "SELECT * FROM bet_details WHERE round_id = $1 ORDER BY id ASC",
    )
    .bind(round_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

pub async fn lock_slip(tx: &mut Transaction<'_, Postgres>, slip_id: Uuid) -> AppResult<BetSlipRow> {
    sqlx::query_as::<_, BetSlipRow>("SELECT * FROM bet_slips WHERE slip_id = $1 FOR UPDATE")
        .bind(slip_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("slip {slip_id}")))
}

pub async fn lock_slip_by_barcode(
    tx: &mut Transaction<'_, Postgres>,
    barcode: &str,
) -> AppResult<BetSlipRow> {
    sqlx::query_as::<_, BetSlipRow>("SELECT * FROM bet_slips WHERE barcode = $1 FOR UPDATE")
        .bind(barcode)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("slip with barcode {barcode}")))
}

pub async fn get_slip(pool: &PgPool, slip_id: Uuid) -> AppResult<BetSlipRow> {
    sqlx::query_as::<_, BetSlipRow>("SELECT * FROM bet_slips WHERE slip_id = $1")
        .bind(slip_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("slip {slip_id}")))
}

pub async fn get_slip_by_barcode(pool: &PgPool, barcode: &str) -> AppResult<BetSlipRow> {
    sqlx::query_as::<_, BetSlipRow>("SELECT * FROM bet_slips WHERE barcode = $1")
        .bind(barcode)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("slip with barcode {barcode}")))
}

pub async fn set_detail_outcome(
    tx: &mut Transaction<'_, Postgres>,
    detail_id: i64,
    is_winner: bool,
    payout: Decimal,
) -> AppResult<()> {
    sqlx::query("UPDATE bet_details SET is_winner = $1, payout = $2 WHERE id = $3")
        .bind(is_winner)
        .bind(payout)
        .bind(detail_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_slip_settled(
    tx: &mut Transaction<'_, Postgres>,
    slip_id: Uuid,
    status: SlipStatus,
    payout_amount: Decimal,
) -> AppResult<()> {
    sqlx::query("UPDATE bet_slips SET status = $1, payout_amount = $2 WHERE slip_id = $3")
        .bind(status)
        .bind(payout_amount)
        .bind(slip_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn mark_claimed(
    tx: &mut Transaction<'_, Postgres>,
    slip_id: Uuid,
    claimed_at: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query("UPDATE bet_slips SET claimed = true, claimed_at = $2 WHERE slip_id = $1")
        .bind(slip_id)
        .bind(claimed_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Marks a pending slip as cancelled. Per SPEC_FULL.md §4.6a the row is
/// retained with `status = lost, cancelled = true` rather than deleted.
pub async fn mark_cancelled(tx: &mut Transaction<'_, Postgres>, slip_id: Uuid) -> AppResult<()> {
    sqlx::query("UPDATE bet_slips SET status = 'lost', cancelled = true WHERE slip_id = $1")
        .bind(slip_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
