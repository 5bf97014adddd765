//! Claim & Cancel Service (spec.md §4.6).
//!
//! `claim` pays out a won, unclaimed slip belonging to the caller.
//! `cancel` refunds a still-open slip before the round's cancel cutoff and
//! marks it cancelled without deleting the row (SPEC_FULL.md §4.6a).

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::db::model::{LedgerKind, RefKind, RoundLifecycle, SlipStatus};
use crate::errors::{AppError, AppResult};
use crate::ledger::{self, Direction};
use crate::money::Money;
use crate::settings::SettingsCache;
use crate::validation::SlipIdentifier;

pub struct ClaimOutcome {
    pub slip_id: Uuid,
    pub amount: Money,
    pub new_balance: Money,
}

pub async fn claim(
    pool: &PgPool,
    user_id: Uuid,
    identifier: &SlipIdentifier,
) -> AppResult<ClaimOutcome> {
    let mut tx = pool.begin().await?;

    let slip = match identifier {
        SlipIdentifier::SlipId(id) => db::slips::lock_slip(&mut tx, *id).await?,
        SlipIdentifier::Barcode(code) => db::slips::lock_slip_by_barcode(&mut tx, code).await?,
    };

    if slip.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if slip.status != SlipStatus::Won {
        return Err(AppError::NotWinning);
    }
    if slip.claimed {
        return Err(AppError::AlreadyClaimed);
    }

    let amount = Money::new(slip.payout_amount);
    let now = Utc::now();

    ledger::apply_entry(
        &mut tx,
        user_id,
        Direction::Credit,
        amount,
        LedgerKind::Game,
        Some(&slip.round_id),
        RefKind::Claim,
        &slip.slip_id.to_string(),
        Some("slip claim"),
    )
    .await?;

    db::slips::mark_claimed(&mut tx, slip.slip_id, now).await?;
    db::audit::record(
        &mut tx,
        &user_id.to_string(),
        "claim",
        "bet_slip",
        &slip.slip_id.to_string(),
        Some(&format!("amount={amount}")),
    )
    .await?;

    let new_balance = Money::new(db::users::lock_user(&mut tx, user_id).await?.deposit_amount);

    tx.commit().await?;

    Ok(ClaimOutcome { slip_id: slip.slip_id, amount, new_balance })
}

pub async fn cancel(
    pool: &PgPool,
    settings: &SettingsCache,
    user_id: Uuid,
    slip_id: Uuid,
) -> AppResult<Money> {
    let mut tx = pool.begin().await?;

    let slip = db::slips::lock_slip(&mut tx, slip_id).await?;
    if slip.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    if slip.cancelled || slip.status != SlipStatus::Pending {
        return Err(AppError::NotCancellable);
    }

    let round = db::rounds::lock(&mut tx, &slip.round_id).await?;
    if round.lifecycle_state == RoundLifecycle::Completed {
        return Err(AppError::NotCancellable);
    }

    let cutoff_seconds = settings.cancel_cutoff_seconds().await;
    let now = Utc::now();
    let cutoff = round.end_time - chrono::Duration::seconds(cutoff_seconds);
    if now >= cutoff {
        return Err(AppError::NotCancellable);
    }

    let refund = Money::new(slip.total_amount);

    ledger::apply_entry(
        &mut tx,
        user_id,
        Direction::Credit,
        refund,
        LedgerKind::Game,
        Some(&slip.round_id),
        RefKind::CancelRefund,
        &slip.slip_id.to_string(),
        Some("slip cancellation refund"),
    )
    .await?;

    let details = db::slips::details_for_slip(&mut tx, slip.slip_id).await?;
    for detail in &details {
        db::slips::upsert_card_total(&mut tx, &slip.round_id, detail.card_number, -detail.bet_amount)
            .await?;
    }

    db::slips::mark_cancelled(&mut tx, slip.slip_id).await?;
    db::audit::record(
        &mut tx,
        &user_id.to_string(),
        "cancel",
        "bet_slip",
        &slip.slip_id.to_string(),
        Some(&format!("refund={refund}")),
    )
    .await?;

    tx.commit().await?;

    Ok(refund)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_outcome_carries_the_slip_id_forward() {
        let slip_id = Uuid::new_v4();
        let outcome = ClaimOutcome { slip_id, amount: Money::ZERO, new_balance: Money::ZERO };
        assert_eq!(outcome.slip_id, slip_id);
    }
}
