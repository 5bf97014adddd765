//! Round Scheduler & State Machine (spec.md §4.7).
//!
//! Drives round lifecycle transitions (`pending -> active -> completed`),
//! triggers settlement both at a round's `end_time` and via a periodic
//! sweep (belt-and-suspenders against a missed tick), and reconciles
//! leftover state on startup. The tick loop's shape — a fixed interval
//! raced against a shutdown signal inside `tokio::select!` — follows the
//! same pattern as the BBS server's main loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::config::{SchedulerConfig, TimezoneConfig};
use crate::db;
use crate::db::model::RoundLifecycle;
use crate::metrics::Metrics;
use crate::settings::SettingsCache;
use crate::settlement::{self, Initiator, SettleOptions};
use crate::timeutil;

pub struct Scheduler {
    pool: PgPool,
    settings: Arc<SettingsCache>,
    metrics: Arc<Metrics>,
    scheduler_cfg: SchedulerConfig,
    timezone_cfg: TimezoneConfig,
}

impl Scheduler {
    pub fn new(
        pool: PgPool,
        settings: Arc<SettingsCache>,
        metrics: Arc<Metrics>,
        scheduler_cfg: SchedulerConfig,
        timezone_cfg: TimezoneConfig,
    ) -> Self {
        Self { pool, settings, metrics, scheduler_cfg, timezone_cfg }
    }

    /// Runs until `ctrl_c` fires. Call [`Scheduler::recover`] once before
    /// this, typically right after process startup.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.scheduler_cfg.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("scheduler started, tick_interval_ms={}", self.scheduler_cfg.tick_interval_ms);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.metrics.record_scheduler_tick();
                    let deadline = Duration::from_secs(self.scheduler_cfg.tick_deadline_seconds);
                    match tokio::time::timeout(deadline, self.tick()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("scheduler tick failed: {e:#}"),
                        Err(_) => warn!("scheduler tick exceeded its deadline of {:?}", deadline),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("scheduler received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Startup reconciliation (spec.md §4.7 "Recovery"): revert rounds
    /// stuck `settling`, complete anything past its `end_time`, and settle
    /// anything `completed` but not yet settled. Idempotent; safe to call
    /// multiple times.
    pub async fn recover(&self) -> anyhow::Result<()> {
        let now = Utc::now();

        let stuck = db::rounds::find_stuck_settling(
            &self.pool,
            now,
            self.scheduler_cfg.stuck_settlement_threshold_seconds,
        )
        .await?;
        for round in &stuck {
            warn!(round_id = %round.round_id, "reverting stuck settlement on startup");
            let mut tx = self.pool.begin().await?;
            db::rounds::revert_to_not_settled(&mut tx, &round.round_id).await?;
            tx.commit().await?;
        }

        self.complete_overdue(now).await?;
        self.retry_failed_settlements().await?;
        self.sweep_unsettled(now).await?;

        Ok(())
    }

    async fn tick(&self) -> anyhow::Result<()> {
        let now = Utc::now();

        self.activate_ready(now).await?;
        self.complete_overdue(now).await?;
        self.retry_failed_settlements().await?;
        self.sweep_unsettled(now).await?;
        self.ensure_open_round(now).await?;

        Ok(())
    }

    /// Re-enters rounds stuck `settlement_status = failed` by reverting
    /// them to `not_settled` (spec.md §9: "an admin or the recovery path
    /// may re-enter, which first resets to not_settled"). The following
    /// sweep tick's [`Scheduler::sweep_unsettled`] then retries settlement
    /// for them, so a persistently-failing round surfaces as `failed`
    /// again rather than being hammered within the same tick.
    async fn retry_failed_settlements(&self) -> anyhow::Result<()> {
        for round in db::rounds::find_failed(&self.pool).await? {
            warn!(round_id = %round.round_id, "re-entering failed settlement for retry");
            let mut tx = self.pool.begin().await?;
            db::rounds::revert_to_not_settled(&mut tx, &round.round_id).await?;
            tx.commit().await?;
        }
        Ok(())
    }

    async fn activate_ready(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        for round in db::rounds::find_ready_to_activate(&self.pool, now).await? {
            let mut tx = self.pool.begin().await?;
            db::rounds::set_lifecycle(&mut tx, &round.round_id, RoundLifecycle::Active).await?;
            tx.commit().await?;
            debug!(round_id = %round.round_id, "round activated");
        }
        Ok(())
    }

    async fn complete_overdue(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        for round in db::rounds::find_overdue_active(&self.pool, now).await? {
            if round.lifecycle_state == RoundLifecycle::Completed {
                continue;
            }
            let mut tx = self.pool.begin().await?;
            db::rounds::set_lifecycle(&mut tx, &round.round_id, RoundLifecycle::Completed).await?;
            tx.commit().await?;
            debug!(round_id = %round.round_id, "round marked completed, settling");

            self.settle(&round.round_id, Initiator::Scheduler).await;
        }
        Ok(())
    }

    async fn sweep_unsettled(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        let grace = self.scheduler_cfg.settlement_sweep_grace_seconds;
        for round in db::rounds::find_due_for_settlement_sweep(&self.pool, now, grace).await? {
            debug!(round_id = %round.round_id, "settlement sweep picking up round");
            self.settle(&round.round_id, Initiator::Alarm).await;
        }
        Ok(())
    }

    async fn settle(&self, round_id: &str, initiator: Initiator) {
        let opts = SettleOptions { winning_card: None, initiator: Some(initiator) };
        match settlement::settle_round(&self.pool, &self.settings, round_id, opts).await {
            Ok(report) => {
                self.metrics.record_settlement_run();
                info!(
                    round_id = %report.round_id,
                    winning_card = report.winning_card,
                    total_payout = %report.total_payout,
                    "round settled"
                );
            }
            Err(crate::errors::AppError::AwaitingManual) => {
                debug!(round_id, "round awaits a manual winning-card decision");
            }
            Err(crate::errors::AppError::SettlementInProgress) => {
                debug!(round_id, "settlement already in progress elsewhere");
            }
            Err(e) => {
                self.metrics.record_settlement_failure();
                error!(round_id, error = %e, "settlement failed");
            }
        }
    }

    /// Creates the next round if none is currently `pending`/`active` and
    /// the operating window (if configured) is open.
    async fn ensure_open_round(&self, now: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        if !db::rounds::find_open(&self.pool).await?.is_empty() {
            return Ok(());
        }

        let window = self.settings.operating_window().await;
        if !timeutil::within_operating_window(&self.timezone_cfg, window.as_ref(), now) {
            return Ok(());
        }

        let duration_seconds = self.settings.round_duration_seconds().await;
        let multiplier = self.settings.payout_multiplier().await;
        let start_time = timeutil::floor_to_duration_boundary(&self.timezone_cfg, now, duration_seconds);
        let round_id = timeutil::round_id_for_start(&self.timezone_cfg, start_time);
        let end_time = start_time + chrono::Duration::seconds(duration_seconds);

        let mut tx = self.pool.begin().await?;
        db::rounds::insert(&mut tx, &round_id, start_time, end_time, multiplier).await?;
        tx.commit().await?;
        info!(round_id = %round_id, duration_seconds, "round created");

        Ok(())
    }
}
