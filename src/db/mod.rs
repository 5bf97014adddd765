//! Persistence layer: typed, transaction-scoped data-access functions per
//! entity, backed by PostgreSQL via `sqlx`. Every function that mutates
//! state takes a `&mut Transaction<'_, Postgres>` explicitly rather than
//! reaching for ambient connection state, per SPEC_FULL.md §9's
//! "ambient ORM" re-architecture note.

pub mod audit;
pub mod ledger;
pub mod model;
pub mod rounds;
pub mod settings;
pub mod slips;
pub mod users;

pub use model::*;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connect to Postgres and run embedded migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .with_context(|| format!("connecting to database at {database_url}"))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running embedded migrations")?;

    Ok(pool)
}
