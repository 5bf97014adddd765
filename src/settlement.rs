//! Settlement Engine (spec.md §4.4 / SPEC_FULL.md §4.4a).
//!
//! `settle_round` is idempotent and safe against concurrent invocations:
//! the `not_settled -> settling` transition is committed in its own
//! transaction before any payout work begins, so concurrent callers
//! observing `settling` back off instead of racing the winning caller.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db;
use crate::db::model::{
    LedgerKind, RefKind, RoundLifecycle, SettlementStatus, SlipStatus,
};
use crate::errors::{AppError, AppResult};
use crate::ledger::{self, Direction};
use crate::money::Money;
use crate::selector::{self, CardTotals, SelectionInput};
use crate::settings::SettingsCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Scheduler,
    Admin,
    Alarm,
    Recovery,
}

#[derive(Debug, Default)]
pub struct SettleOptions {
    /// Admin-supplied winning card; bypasses the selector policy entirely.
    pub winning_card: Option<i32>,
    pub initiator: Option<Initiator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub round_id: String,
    pub winning_card: i32,
    pub winning_slip_count: u64,
    pub losing_slip_count: u64,
    pub total_payout: Money,
    pub house_profit: Money,
}

/// Entry point. See module docs and spec.md §4.4 for the full algorithm.
pub async fn settle_round(
    pool: &PgPool,
    settings: &SettingsCache,
    round_id: &str,
    opts: SettleOptions,
) -> AppResult<SettlementReport> {
    let now = Utc::now();

    {
        let mut gate_tx = pool.begin().await?;
        let round = db::rounds::lock(&mut gate_tx, round_id).await?;

        match round.settlement_status {
            SettlementStatus::Settled => {
                return build_report_from_settled_round(pool, round_id, round.winning_card).await;
            }
            SettlementStatus::Settling => {
                return Err(AppError::SettlementInProgress);
            }
            SettlementStatus::Failed => {
                return Err(AppError::SettlementFailed(
                    round.settlement_error.unwrap_or_else(|| "unknown".to_string()),
                ));
            }
            SettlementStatus::NotSettled => {
                if round.lifecycle_state != RoundLifecycle::Completed {
                    return Err(AppError::NotReady);
                }
                let began = db::rounds::try_begin_settling(&mut gate_tx, round_id, now).await?;
                gate_tx.commit().await?;
                if !began {
                    // Lost a race to another caller between lock and commit.
                    return Err(AppError::SettlementInProgress);
                }
            }
        }
    }

    match do_settlement_work(pool, settings, round_id, &opts, now).await {
        Ok(report) => Ok(report),
        Err(AppError::AwaitingManual) => {
            let mut tx = pool.begin().await?;
            db::rounds::revert_to_not_settled(&mut tx, round_id).await?;
            tx.commit().await?;
            Err(AppError::AwaitingManual)
        }
        Err(e) => {
            let mut tx = pool.begin().await?;
            db::rounds::mark_failed(&mut tx, round_id, &e.to_string()).await?;
            tx.commit().await?;
            Err(AppError::SettlementFailed(e.to_string()))
        }
    }
}

async fn build_report_from_settled_round(
    pool: &PgPool,
    round_id: &str,
    winning_card: Option<i32>,
) -> AppResult<SettlementReport> {
    let winning_card = winning_card.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "round {round_id} is settled but has no winning_card"
        ))
    })?;

    let mut tx = pool.begin().await?;
    let slips = db::slips::slips_for_round(&mut tx, round_id).await?;
    tx.rollback().await.ok();

    let total_wagered: Decimal = slips.iter().map(|s| s.total_amount).sum();
    let total_payout: Decimal = slips.iter().map(|s| s.payout_amount).sum();
    let winning_slip_count = slips.iter().filter(|s| s.status == SlipStatus::Won).count() as u64;
    let losing_slip_count = slips.iter().filter(|s| s.status == SlipStatus::Lost).count() as u64;

    Ok(SettlementReport {
        round_id: round_id.to_string(),
        winning_card,
        winning_slip_count,
        losing_slip_count,
        total_payout: Money::new(total_payout),
        house_profit: Money::new(total_wagered - total_payout),
    })
}

async fn do_settlement_work(
    pool: &PgPool,
    settings: &SettingsCache,
    round_id: &str,
    opts: &SettleOptions,
    completed_at: chrono::DateTime<Utc>,
) -> AppResult<SettlementReport> {
    let mut tx = pool.begin().await?;

    let round = db::rounds::get(pool, round_id).await?;
    let card_count = settings.card_count().await;

    let winning_card = match opts.winning_card {
        Some(card) => {
            if !(1..=card_count).contains(&card) {
                return Err(AppError::Validation(format!(
                    "winning card {card} out of range [1,{card_count}]"
                )));
            }
            card
        }
        None => {
            let game_result_type = settings.game_result_type().await;
            if matches!(game_result_type, crate::db::model::GameResultType::Manual) {
                return Err(AppError::AwaitingManual);
            }
            let totals_rows = db::slips::card_totals_tx(&mut tx, round_id).await?;
            let mut bets: CardTotals = CardTotals::new();
            for row in totals_rows {
                bets.insert(row.card_number, Money::new(row.total_amount));
            }
            let policy = settings.winning_card_policy().await;
            let fixed_winning_card = settings.fixed_winning_card().await;
            selector::select_winning_card(&SelectionInput {
                bets: &bets,
                card_count,
                multiplier: round.payout_multiplier,
                policy,
                fixed_winning_card,
            })
        }
    };

    let slips = db::slips::slips_for_round(&mut tx, round_id).await?;
    let mut winning_slip_count = 0u64;
    let mut losing_slip_count = 0u64;
    let mut total_payout = Money::ZERO;
    let total_wagered: Decimal = slips.iter().map(|s| s.total_amount).sum();

    let auto_claim = settings.auto_claim().await;

    for slip in &slips {
        let details = db::slips::details_for_slip(&mut tx, slip.slip_id).await?;
        let mut slip_payout = Money::ZERO;
        let mut is_winner = false;

        for detail in &details {
            let detail_is_winner = detail.card_number == winning_card;
            let payout = if detail_is_winner {
                Money::new(detail.bet_amount)
                    .checked_mul(round.payout_multiplier)
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payout overflow")))?
            } else {
                Money::ZERO
            };
            db::slips::set_detail_outcome(&mut tx, detail.id, detail_is_winner, payout.as_decimal())
                .await?;
            if detail_is_winner {
                is_winner = true;
                slip_payout = slip_payout
                    .checked_add(payout)
                    .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payout overflow")))?;
            }
        }

        let status = if is_winner { SlipStatus::Won } else { SlipStatus::Lost };
        db::slips::set_slip_settled(&mut tx, slip.slip_id, status, slip_payout.as_decimal()).await?;

        if is_winner {
            winning_slip_count += 1;
            total_payout = total_payout
                .checked_add(slip_payout)
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("payout overflow")))?;

            if auto_claim {
                ledger::apply_entry(
                    &mut tx,
                    slip.user_id,
                    Direction::Credit,
                    slip_payout,
                    LedgerKind::Game,
                    Some(round_id),
                    RefKind::Settlement,
                    &slip.slip_id.to_string(),
                    Some("round settlement payout"),
                )
                .await?;
                db::slips::mark_claimed(&mut tx, slip.slip_id, completed_at).await?;
            }
        } else {
            losing_slip_count += 1;
        }
    }

    db::rounds::mark_settled(&mut tx, round_id, winning_card, completed_at).await?;
    db::audit::record(
        &mut tx,
        match opts.initiator {
            Some(Initiator::Admin) => "admin",
            Some(Initiator::Scheduler) => "scheduler",
            Some(Initiator::Alarm) => "alarm",
            Some(Initiator::Recovery) => "recovery",
            None => "system",
        },
        "settle_round",
        "round",
        round_id,
        Some(&format!("winning_card={winning_card}")),
    )
    .await?;

    tx.commit().await?;

    Ok(SettlementReport {
        round_id: round_id.to_string(),
        winning_card,
        winning_slip_count,
        losing_slip_count,
        total_payout,
        house_profit: Money::new(total_wagered) - total_payout,
    })
}

/// Read-only preview for `GET /admin/games/{roundId}/settlement-preview`
/// (SPEC_FULL.md §4.8): runs the same arithmetic as the `lowest_loss`
/// policy for every candidate card, without mutating anything.
pub struct CardPreview {
    pub card_number: i32,
    pub total_wagered_on_card: Money,
    pub expected_payout: Money,
    pub house_profit: Money,
}

pub async fn settlement_preview(
    pool: &PgPool,
    settings: &SettingsCache,
    round_id: &str,
) -> AppResult<Vec<CardPreview>> {
    let round = db::rounds::get(pool, round_id).await?;
    let card_count = settings.card_count().await;
    let totals_rows = db::slips::card_totals(pool, round_id).await?;

    let mut bets: CardTotals = CardTotals::new();
    for row in totals_rows {
        bets.insert(row.card_number, Money::new(row.total_amount));
    }
    let total_wagered: Decimal = bets.values().map(|m| m.as_decimal()).sum();

    let mut previews = Vec::with_capacity(card_count as usize);
    for card in 1..=card_count {
        let bet_on_card = bets.get(&card).copied().unwrap_or(Money::ZERO);
        let expected_payout = bet_on_card
            .checked_mul(round.payout_multiplier)
            .unwrap_or(Money::ZERO);
        let profit = Money::new(total_wagered) - expected_payout;
        previews.push(CardPreview {
            card_number: card,
            total_wagered_on_card: bet_on_card,
            expected_payout,
            house_profit: profit,
        });
    }
    Ok(previews)
}
