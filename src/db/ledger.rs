//! Typed data access for `wallet_ledger_entries`. This module only knows
//! how to read and write rows; the balance-check/lock discipline lives in
//! [`crate::ledger`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::model::{LedgerDirection, LedgerEntryRow, LedgerKind, RefKind};
use crate::errors::AppResult;

#[allow(clippy::too_many_arguments)]
pub async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    kind: LedgerKind,
    amount: Decimal,
    direction: LedgerDirection,
    round_id: Option<&str>,
    ref_kind: RefKind,
    ref_id: &str,
    comment: Option<&str>,
) -> AppResult<LedgerEntryRow> {
    let entry_id = Uuid::new_v4();
    let row = sqlx::query_as::<_, LedgerEntryRow>(
        "INSERT INTO wallet_ledger_entries
            (entry_id, user_id, kind, amount, direction, round_id, ref_kind, ref_id, status, comment)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'completed', $9)
         RETURNING *",
    )
    .bind(entry_id)
    .bind(user_id)
    .bind(kind)
    .bind(amount)
    .bind(direction)
    .bind(round_id)
    .bind(ref_kind)
    .bind(ref_id)
    .bind(comment)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

pub struct EntryFilter {
    pub ref_kind: Option<RefKind>,
}

pub async fn list_entries(
    pool: &PgPool,
    user_id: Uuid,
    filter: &EntryFilter,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<LedgerEntryRow>> {
    let rows = match filter.ref_kind {
        Some(kind) => {
            sqlx::query_as::<_, LedgerEntryRow>(
                "SELECT * FROM wallet_ledger_entries
                 WHERE user_id = $1 AND ref_kind = $2
                 ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            )
            .bind(user_id)
            .bind(kind)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, LedgerEntryRow>(
                "SELECT * FROM wallet_ledger_entries
                 WHERE user_id = $1
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Net signed sum (credits minus debits) of completed entries for a user
/// within `[since, until)`. Backs `GET /wallet/summary` and property P1.
pub async fn summarize(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> AppResult<Decimal> {
    let row: (Option<Decimal>,) = sqlx::query_as(
        "SELECT SUM(
            CASE WHEN direction = 'credit' THEN amount ELSE -amount END
         )
         FROM wallet_ledger_entries
         WHERE user_id = $1 AND status = 'completed' AND created_at >= $2 AND created_at < $3",
    )
    .bind(user_id)
    .bind(since)
    .bind(until)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(Decimal::ZERO))
}

pub async fn find_by_ref(
    pool: &PgPool,
    ref_kind: RefKind,
    ref_id: &str,
) -> AppResult<Vec<LedgerEntryRow>> {
    let rows = sqlx::query_as::<_, LedgerEntryRow>(
        "SELECT * FROM wallet_ledger_entries WHERE ref_kind = $1 AND ref_id = $2",
    )
    .bind(ref_kind)
    .bind(ref_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
