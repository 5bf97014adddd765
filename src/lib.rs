//! # Wagerhall — card-based wagering and settlement engine
//!
//! A round-based wagering system: players bet on numbered cards within a
//! fixed-duration round, a winning card is chosen by policy once the round
//! closes, and winners are paid out at a configured multiplier. The engine
//! owns wallet balances, bet slips, round lifecycle, and settlement; it
//! does not own authentication, which a deployment is expected to front
//! this crate with.
//!
//! ## Module organization
//!
//! - [`money`] — fixed-point `Money` newtype used for every balance/amount.
//! - [`errors`] — the stable `AppError` taxonomy and its HTTP mapping.
//! - [`config`] — typed, TOML-backed process configuration.
//! - [`db`] — typed persistence: migrations and per-entity data access.
//! - [`settings`] — read-through cache over runtime-mutable settings.
//! - [`ledger`] — wallet debit/credit with the non-negative-balance invariant.
//! - [`selector`] — pure winning-card selection policies.
//! - [`settlement`] — the settlement engine and its gate transaction.
//! - [`betting`] — bet placement, idempotency, and wallet debit.
//! - [`claim`] — slip claim and cancellation.
//! - [`scheduler`] — round lifecycle driver and settlement scheduling.
//! - [`timeutil`] — UTC storage, fixed-offset presentation/decision edge.
//! - [`validation`] — request-shape and bounds validation.
//! - [`metrics`] — in-process counters exposed via `GET /admin/metrics`.
//! - [`logutil`] — log-line sanitization helpers.
//! - [`http`] — the axum router and its request/response DTOs.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use wagerhall::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let pool = wagerhall::db::connect(&config.database.url, config.database.max_connections).await?;
//!     let settings = std::sync::Arc::new(wagerhall::settings::SettingsCache::new(
//!         pool.clone(),
//!         std::time::Duration::from_secs(60),
//!     ));
//!     let metrics = std::sync::Arc::new(wagerhall::metrics::Metrics::new());
//!     let scheduler = wagerhall::scheduler::Scheduler::new(
//!         pool.clone(),
//!         settings.clone(),
//!         metrics.clone(),
//!         config.scheduler.clone(),
//!         config.timezone,
//!     );
//!     scheduler.recover().await?;
//!     Ok(())
//! }
//! ```

pub mod betting;
pub mod claim;
pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod ledger;
pub mod logutil;
pub mod metrics;
pub mod money;
pub mod scheduler;
pub mod selector;
pub mod settings;
pub mod settlement;
pub mod timeutil;
pub mod validation;
