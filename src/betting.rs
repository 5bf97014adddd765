//! Bet Placement Service (spec.md §4.5).
//!
//! `place_bet` validates and writes a bet slip with its card-level bets,
//! debits the wallet in the same transaction, updates per-card totals,
//! and honors idempotency keys (I7).

use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::db::model::{BetDetailRow, BetSlipRow, LedgerKind, RefKind, RoundLifecycle};
use crate::errors::{AppError, AppResult};
use crate::ledger::{self, Direction};
use crate::settings::SettingsCache;
use crate::validation::{self, RawBetLine};

const BARCODE_COLLISION_RETRIES: u32 = 5;

pub struct PlacedBet {
    pub slip: BetSlipRow,
    pub details: Vec<BetDetailRow>,
}

pub async fn place_bet(
    pool: &PgPool,
    settings: &SettingsCache,
    user_id: Uuid,
    round_id: &str,
    lines: &[RawBetLine],
    idempotency_key: Option<&str>,
) -> AppResult<PlacedBet> {
    let card_count = settings.card_count().await;
    let max_bet_amount = settings.max_bet_amount().await;
    let total_amount = validation::validate_bet_lines(lines, card_count, max_bet_amount)?;

    let mut tx = pool.begin().await?;

    if let Some(key) = idempotency_key {
        if let Some(existing) = db::slips::find_by_idempotency_key(&mut tx, user_id, key).await? {
            let details = db::slips::details_for_slip(&mut tx, existing.slip_id).await?;
            tx.rollback().await.ok();
            return Ok(PlacedBet { slip: existing, details });
        }
        if db::slips::idempotency_key_used_by_other(&mut tx, user_id, key).await? {
            return Err(AppError::Conflict(
                "idempotency key already used by a different user".to_string(),
            ));
        }
    }

    let round = db::rounds::lock(&mut tx, round_id).await?;
    let now = Utc::now();
    if round.lifecycle_state != RoundLifecycle::Active || now >= round.end_time {
        return Err(AppError::RoundClosed);
    }

    let slip_id = Uuid::new_v4();

    ledger::apply_entry(
        &mut tx,
        user_id,
        Direction::Debit,
        total_amount,
        LedgerKind::Game,
        Some(round_id),
        RefKind::BetPlacement,
        &slip_id.to_string(),
        Some("bet slip placement"),
    )
    .await?;

    let barcode = generate_unique_barcode(&mut tx, round_id).await?;

    if let Err(err) = db::slips::insert_slip(
        &mut tx,
        slip_id,
        user_id,
        round_id,
        total_amount.as_decimal(),
        &barcode,
        idempotency_key,
    )
    .await
    {
        // Two concurrent placements with the same (user_id, idempotency_key)
        // can both miss the lookup above before either commits; the loser
        // hits the unique index here instead of a second lookup race. Return
        // the winner's slip rather than surfacing its constraint violation.
        if let (Some(key), AppError::Database(db_err)) = (idempotency_key, &err) {
            if db::slips::is_idempotency_key_conflict(db_err) {
                tx.rollback().await.ok();
                let mut recovery_tx = pool.begin().await?;
                let existing = db::slips::find_by_idempotency_key(&mut recovery_tx, user_id, key)
                    .await?
                    .ok_or(AppError::Conflict(
                        "idempotency key conflict could not be resolved".to_string(),
                    ))?;
                let details =
                    db::slips::details_for_slip(&mut recovery_tx, existing.slip_id).await?;
                recovery_tx.rollback().await.ok();
                return Ok(PlacedBet { slip: existing, details });
            }
        }
        return Err(err);
    }

    for line in lines {
        db::slips::insert_detail(
            &mut tx,
            slip_id,
            round_id,
            user_id,
            &db::slips::NewLine {
                card_number: line.card_number,
                bet_amount: line.amount.as_decimal(),
            },
        )
        .await?;
        db::slips::upsert_card_total(&mut tx, round_id, line.card_number, line.amount.as_decimal())
            .await?;
    }

    db::audit::record(
        &mut tx,
        &user_id.to_string(),
        "place_bet",
        "bet_slip",
        &slip_id.to_string(),
        Some(&format!("round={round_id} total={total_amount}")),
    )
    .await?;

    let details = db::slips::details_for_slip(&mut tx, slip_id).await?;

    tx.commit().await?;

    // Built from what we just inserted rather than re-queried, since the
    // insert is only visible through `tx`, which is now consumed by commit.
    let slip = BetSlipRow {
        slip_id,
        user_id,
        round_id: round_id.to_string(),
        total_amount: total_amount.as_decimal(),
        barcode,
        payout_amount: rust_decimal::Decimal::ZERO,
        status: db::model::SlipStatus::Pending,
        cancelled: false,
        claimed: false,
        claimed_at: None,
        idempotency_key: idempotency_key.map(|s| s.to_string()),
        created_at: now,
    };

    Ok(PlacedBet { slip, details })
}

async fn generate_unique_barcode(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    round_id: &str,
) -> AppResult<String> {
    for _ in 0..BARCODE_COLLISION_RETRIES {
        let suffix: String = {
            let mut rng = rand::thread_rng();
            (0..6)
                .map(|_| {
                    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
                    ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
                })
                .collect()
        };
        let candidate = format!("{round_id}-{suffix}");
        if !db::slips::barcode_exists(tx, &candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Conflict(
        "could not generate a unique barcode after several attempts".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barcode_alphabet_excludes_ambiguous_characters() {
        // 0/O and 1/I are deliberately excluded from the barcode alphabet
        // since barcodes are read back by humans at point-of-sale.
        const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
        for forbidden in [b'0', b'O', b'1', b'I'] {
            assert!(!ALPHABET.contains(&forbidden));
        }
    }
}
