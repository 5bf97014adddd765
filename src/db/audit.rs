//! Structured audit emission, written from inside the same transaction as
//! the mutation that produced it (SPEC_FULL.md §2, item 14). The audit
//! *table* is an external collaborator the admin UI reads from; the core
//! only ever appends.

use sqlx::{Postgres, Transaction};

use crate::errors::AppResult;

pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    actor: &str,
    action: &str,
    entity_kind: &str,
    entity_id: &str,
    detail: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO audit_log (actor, action, entity_kind, entity_id, detail)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(actor)
    .bind(action)
    .bind(entity_kind)
    .bind(entity_id)
    .bind(detail)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
