//! Read-through settings cache over the `settings` key/value table
//! (SPEC_FULL.md §2, module 1 / spec.md §4.1).
//!
//! Entries are considered fresh for a configured TTL (default 60s); on
//! miss or expiry the table is queried. On query failure a still-present
//! stale entry is served rather than the default; the default is only
//! used when no entry was ever loaded. The lock guarding the in-memory map
//! is never held across the database call that repopulates an entry
//! (SPEC_FULL.md §9).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db;
use crate::db::model::{GameResultType, WinningCardPolicy};
use crate::money::Money;

struct CachedEntry {
    value: String,
    loaded_at: Instant,
}

pub struct SettingsCache {
    pool: PgPool,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedEntry>>,
}

impl SettingsCache {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Clears the map. Invoked after any admin settings mutation
    /// (`PATCH /admin/settings`).
    pub fn invalidate(&self) {
        self.entries
            .lock()
            .expect("settings cache mutex poisoned")
            .clear();
    }

    fn fresh_cached(&self, key: &str) -> Option<String> {
        let guard = self.entries.lock().expect("settings cache mutex poisoned");
        guard.get(key).and_then(|entry| {
            if entry.loaded_at.elapsed() < self.ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    fn stale_cached(&self, key: &str) -> Option<String> {
        let guard = self.entries.lock().expect("settings cache mutex poisoned");
        guard.get(key).map(|entry| entry.value.clone())
    }

    fn store(&self, key: &str, value: String) {
        let mut guard = self.entries.lock().expect("settings cache mutex poisoned");
        guard.insert(
            key.to_string(),
            CachedEntry {
                value,
                loaded_at: Instant::now(),
            },
        );
    }

    /// Read a setting as a raw string, applying the cache/TTL/stale-fallback
    /// policy described in spec.md §4.1.
    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(fresh) = self.fresh_cached(key) {
            return Some(fresh);
        }
        match db::settings::get(&self.pool, key).await {
            Ok(Some(row)) => {
                self.store(key, row.value.clone());
                Some(row.value)
            }
            Ok(None) => None,
            Err(_) => self.stale_cached(key),
        }
    }

    pub async fn get_number<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key).await {
            Some(raw) => raw.trim().parse().unwrap_or(default),
            None => default,
        }
    }

    pub async fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get(key).await {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => default,
            },
            None => default,
        }
    }

    pub async fn round_duration_seconds(&self) -> i64 {
        self.get_number("round_duration_seconds", 300).await
    }

    pub async fn payout_multiplier(&self) -> Decimal {
        match self.get("payout_multiplier").await {
            Some(raw) => Decimal::from_str(raw.trim()).unwrap_or_else(|_| Decimal::new(1000, 2)),
            None => Decimal::new(1000, 2),
        }
    }

    pub async fn card_count(&self) -> i32 {
        self.get_number("card_count", 12).await
    }

    pub async fn game_result_type(&self) -> GameResultType {
        match self.get("game_result_type").await {
            Some(raw) => raw.trim().parse().unwrap_or(GameResultType::Manual),
            None => GameResultType::Manual,
        }
    }

    pub async fn winning_card_policy(&self) -> WinningCardPolicy {
        match self.get("winning_card_policy").await {
            Some(raw) => raw.trim().parse().unwrap_or(WinningCardPolicy::LowestLoss),
            None => WinningCardPolicy::LowestLoss,
        }
    }

    pub async fn auto_claim(&self) -> bool {
        self.get_boolean("auto_claim", false).await
    }

    pub async fn max_bet_amount(&self) -> Option<Money> {
        self.get("max_bet_amount")
            .await
            .and_then(|raw| Money::parse(&raw).ok())
    }

    pub async fn fixed_winning_card(&self) -> Option<i32> {
        self.get("fixed_winning_card")
            .await
            .and_then(|raw| raw.trim().parse().ok())
    }

    /// `HH:MM` strings in the fixed timezone; `None` means "no restriction".
    pub async fn operating_window(&self) -> Option<(String, String)> {
        let start = self.get("operating_window_start").await?;
        let end = self.get("operating_window_end").await?;
        Some((start, end))
    }

    pub async fn cancel_cutoff_seconds(&self) -> i64 {
        self.get_number("cancel_cutoff_seconds", 10).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_parsing_accepts_common_spellings() {
        // Exercised indirectly through get_boolean in integration tests;
        // this just pins the accepted literal set against drift.
        let accepted_true = ["true", "1", "yes", "TRUE", "Yes"];
        for v in accepted_true {
            assert!(matches!(
                v.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            ));
        }
    }
}
