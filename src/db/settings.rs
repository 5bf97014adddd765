//! Raw row access for the `settings` key/value table. [`crate::settings::SettingsCache`]
//! is the read-through layer other components actually use.

use sqlx::PgPool;

use super::model::SettingRow;
use crate::errors::AppResult;

pub async fn get(pool: &PgPool, key: &str) -> AppResult<Option<SettingRow>> {
    let row = sqlx::query_as::<_, SettingRow>("SELECT * FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn upsert(pool: &PgPool, key: &str, value: &str) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, now())
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn all(pool: &PgPool) -> AppResult<Vec<SettingRow>> {
    let rows = sqlx::query_as::<_, SettingRow>("SELECT * FROM settings")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
