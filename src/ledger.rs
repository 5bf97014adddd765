//! Wallet Ledger (spec.md §4.2 / SPEC_FULL.md §4.2a).
//!
//! The single public write operation is [`apply_entry`], always called
//! inside an enclosing database transaction. It locks the user row,
//! enforces the non-negative-balance invariant (I1) on debits, and writes
//! an append-only ledger row. It never performs HTTP or other side
//! effects, and never reads or writes without holding the row lock.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::db;
use crate::db::model::{LedgerDirection, LedgerEntryRow, LedgerKind, RefKind};
use crate::errors::{AppError, AppResult};
use crate::money::Money;

#[derive(Debug, Clone, Copy)]
pub enum Direction {
    Credit,
    Debit,
}

impl From<Direction> for LedgerDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Credit => LedgerDirection::Credit,
            Direction::Debit => LedgerDirection::Debit,
        }
    }
}

/// Apply one ledger entry against `user_id`'s balance inside `tx`.
///
/// For a debit: locks the row, fails with [`AppError::InsufficientFunds`]
/// if the balance would go negative, otherwise subtracts. For a credit:
/// locks the row and adds. Either way the persisted [`LedgerEntryRow`] is
/// returned; the caller may still abort the outer transaction, in which
/// case nothing here survives.
#[allow(clippy::too_many_arguments)]
pub async fn apply_entry(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    direction: Direction,
    amount: Money,
    kind: LedgerKind,
    round_id: Option<&str>,
    ref_kind: RefKind,
    ref_id: &str,
    comment: Option<&str>,
) -> AppResult<LedgerEntryRow> {
    if !amount.is_positive() {
        return Err(AppError::Validation(
            "ledger entry amount must be strictly positive".to_string(),
        ));
    }

    let user = db::users::lock_user(tx, user_id).await?;
    let balance = Money::new(user.deposit_amount);

    let new_balance = match direction {
        Direction::Debit => {
            let remaining = balance
                .checked_sub(amount)
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("balance underflow")))?;
            if remaining.is_negative() {
                return Err(AppError::InsufficientFunds);
            }
            remaining
        }
        Direction::Credit => balance
            .checked_add(amount)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("balance overflow")))?,
    };

    db::users::set_balance(tx, user_id, new_balance.as_decimal()).await?;

    let entry = db::ledger::insert_entry(
        tx,
        user_id,
        kind,
        amount.as_decimal(),
        direction.into(),
        round_id,
        ref_kind,
        ref_id,
        comment,
    )
    .await?;

    Ok(entry)
}

/// Non-locking read of a user's ledger history.
pub async fn list_entries(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    ref_kind: Option<RefKind>,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<LedgerEntryRow>> {
    db::ledger::list_entries(pool, user_id, &db::ledger::EntryFilter { ref_kind }, limit, offset).await
}

/// Non-locking summary: net signed sum of completed entries since `range_start`.
pub async fn summarize(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    range_start: chrono::DateTime<Utc>,
) -> AppResult<Money> {
    let sum: Decimal = db::ledger::summarize(pool, user_id, range_start, Utc::now()).await?;
    Ok(Money::new(sum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_maps_to_ledger_direction() {
        assert!(matches!(
            LedgerDirection::from(Direction::Credit),
            LedgerDirection::Credit
        ));
        assert!(matches!(
            LedgerDirection::from(Direction::Debit),
            LedgerDirection::Debit
        ));
    }
}
