//! Typed data access for the `users` wallet view. The core never touches
//! any column beyond `deposit_amount`; the rest of the `users` table is
//! owned by the admin/auth collaborator in a real deployment.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::model::UserRow;
use crate::errors::{AppError, AppResult};

/// Lock the user row `FOR UPDATE` and return its current balance row.
/// Every wallet debit/credit goes through this first (spec.md §5's
/// suspension-point list).
pub async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> AppResult<UserRow> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, deposit_amount, created_at FROM users WHERE id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
}

pub async fn set_balance(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    new_balance: rust_decimal::Decimal,
) -> AppResult<()> {
    sqlx::query("UPDATE users SET deposit_amount = $1 WHERE id = $2")
        .bind(new_balance)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Create a new wallet-view user row with the given opening balance. Used
/// by test fixtures and by deployments that run this crate standalone
/// instead of pointing at a pre-existing `users` table.
pub async fn create_user(
    pool: &sqlx::PgPool,
    opening_balance: rust_decimal::Decimal,
) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, deposit_amount) VALUES ($1, $2)")
        .bind(id)
        .bind(opening_balance)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn get_balance(pool: &sqlx::PgPool, user_id: Uuid) -> AppResult<rust_decimal::Decimal> {
    let row: (rust_decimal::Decimal,) =
        sqlx::query_as("SELECT deposit_amount FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
    Ok(row.0)
}
