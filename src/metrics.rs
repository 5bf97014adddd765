//! Metrics scaffolding (SPEC_FULL.md §2, module 15).
//!
//! Plain atomic counters exposed as a JSON snapshot under
//! `GET /admin/metrics`. No histograms or Prometheus exposition yet —
//! this mirrors the counter-only shape the rest of this corpus starts
//! with before a metrics backend is wired in.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Metrics {
    bets_placed: AtomicU64,
    bets_rejected: AtomicU64,
    claims_paid: AtomicU64,
    cancels: AtomicU64,
    settlements_run: AtomicU64,
    settlement_failures: AtomicU64,
    scheduler_ticks: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bet_placed(&self) {
        self.bets_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bet_rejected(&self) {
        self.bets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claim_paid(&self) {
        self.claims_paid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancel(&self) {
        self.cancels.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement_run(&self) {
        self.settlements_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_settlement_failure(&self) {
        self.settlement_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduler_tick(&self) {
        self.scheduler_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bets_placed: self.bets_placed.load(Ordering::Relaxed),
            bets_rejected: self.bets_rejected.load(Ordering::Relaxed),
            claims_paid: self.claims_paid.load(Ordering::Relaxed),
            cancels: self.cancels.load(Ordering::Relaxed),
            settlements_run: self.settlements_run.load(Ordering::Relaxed),
            settlement_failures: self.settlement_failures.load(Ordering::Relaxed),
            scheduler_ticks: self.scheduler_ticks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub bets_placed: u64,
    pub bets_rejected: u64,
    pub claims_paid: u64,
    pub cancels: u64,
    pub settlements_run: u64,
    pub settlement_failures: u64,
    pub scheduler_ticks: u64,
}
