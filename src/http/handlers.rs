//! Route handlers. Each is a thin adapter: parse/validate the wire shape,
//! call the relevant domain service, map the result to a DTO. No business
//! logic lives here.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::betting;
use crate::claim;
use crate::db;
use crate::errors::{AppError, AppResult};
use crate::http::dto::*;
use crate::http::AppState;
use crate::settlement::{self, SettleOptions};
use crate::validation::{self, RawBetLine};

const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// The caller's user id. A real deployment resolves this from a session
/// or bearer token at an upstream auth layer; this crate's scope stops at
/// accepting it as a trusted header (SPEC_FULL.md's Non-goals exclude an
/// authentication subsystem).
fn caller_user_id(headers: &HeaderMap) -> AppResult<Uuid> {
    let raw = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;
    Uuid::parse_str(raw).map_err(|_| AppError::Unauthenticated)
}

pub async fn place_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PlaceBetRequest>,
) -> AppResult<Json<SlipDto>> {
    let user_id = caller_user_id(&headers)?;
    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let mut lines = Vec::with_capacity(req.lines.len());
    for line in &req.lines {
        lines.push(RawBetLine {
            card_number: line.card_number,
            amount: parse_money(&line.bet_amount)?,
        });
    }

    let result = match betting::place_bet(
        &state.pool,
        &state.settings,
        user_id,
        &req.round_id,
        &lines,
        idempotency_key.as_deref(),
    )
    .await
    {
        Ok(placed) => {
            state.metrics.record_bet_placed();
            placed
        }
        Err(e) => {
            state.metrics.record_bet_rejected();
            return Err(e);
        }
    };

    Ok(Json(SlipDto::new(&result.slip, &result.details)))
}

pub async fn claim_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ClaimRequest>,
) -> AppResult<Json<ClaimResponse>> {
    let user_id = caller_user_id(&headers)?;
    let identifier = validation::parse_slip_identifier(&req.identifier)?;

    let outcome = claim::claim(&state.pool, user_id, &identifier).await?;
    state.metrics.record_claim_paid();

    Ok(Json(ClaimResponse {
        amount: outcome.amount.to_string(),
        new_balance: outcome.new_balance.to_string(),
    }))
}

pub async fn cancel_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CancelRequest>,
) -> AppResult<Json<CancelResponse>> {
    let user_id = caller_user_id(&headers)?;

    let refund = claim::cancel(&state.pool, &state.settings, user_id, req.slip_id).await?;
    state.metrics.record_cancel();

    Ok(Json(CancelResponse { refunded_amount: refund.to_string() }))
}

pub async fn get_slip(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Json<SlipDto>> {
    let parsed = validation::parse_slip_identifier(&identifier).map_err(|e| {
        tracing::debug!(identifier = %crate::logutil::escape_log(&identifier), "rejected slip identifier");
        e
    })?;
    let slip = match parsed {
        validation::SlipIdentifier::SlipId(id) => db::slips::get_slip(&state.pool, id).await?,
        validation::SlipIdentifier::Barcode(code) => {
            db::slips::get_slip_by_barcode(&state.pool, &code).await?
        }
    };
    let mut tx = state.pool.begin().await?;
    let details = db::slips::details_for_slip(&mut tx, slip.slip_id).await?;
    tx.rollback().await.ok();

    Ok(Json(SlipDto::new(&slip, &details)))
}

pub async fn get_current_round(State(state): State<AppState>) -> AppResult<Json<RoundDto>> {
    let round = db::rounds::find_open(&state.pool)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("no open round".to_string()))?;
    Ok(Json(RoundDto::from(&round)))
}

pub async fn get_previous_round(State(state): State<AppState>) -> AppResult<Json<RoundDto>> {
    let round = db::rounds::latest(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("no rounds yet".to_string()))?;
    Ok(Json(RoundDto::from(&round)))
}

pub async fn get_round(
    State(state): State<AppState>,
    Path(round_id): Path<String>,
) -> AppResult<Json<RoundDto>> {
    let round = db::rounds::get(&state.pool, &round_id).await?;
    Ok(Json(RoundDto::from(&round)))
}

pub async fn wallet_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<WalletSummaryResponse>> {
    let user_id = caller_user_id(&headers)?;
    let balance = db::users::get_balance(&state.pool, user_id).await?;
    let entries = db::ledger::list_entries(
        &state.pool,
        user_id,
        &db::ledger::EntryFilter { ref_kind: None },
        50,
        0,
    )
    .await?;

    Ok(Json(WalletSummaryResponse {
        balance: balance.to_string(),
        entries: entries.iter().map(LedgerEntryDto::from).collect(),
    }))
}

pub async fn admin_settle_round(
    State(state): State<AppState>,
    Path(round_id): Path<String>,
    Json(req): Json<SettleRequest>,
) -> AppResult<Json<SettlementReportDto>> {
    let opts = SettleOptions {
        winning_card: req.winning_card,
        initiator: Some(crate::settlement::Initiator::Admin),
    };
    let report = match settlement::settle_round(&state.pool, &state.settings, &round_id, opts).await {
        Ok(report) => report,
        Err(e @ AppError::SettlementFailed(_)) => {
            state.metrics.record_settlement_failure();
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    state.metrics.record_settlement_run();
    Ok(Json(SettlementReportDto::from(&report)))
}

pub async fn admin_settlement_preview(
    State(state): State<AppState>,
    Path(round_id): Path<String>,
) -> AppResult<Json<Vec<CardPreviewDto>>> {
    let previews = settlement::settlement_preview(&state.pool, &state.settings, &round_id).await?;
    Ok(Json(previews.iter().map(CardPreviewDto::from).collect()))
}

pub async fn admin_update_setting(
    State(state): State<AppState>,
    Json(req): Json<UpsertSettingRequest>,
) -> AppResult<StatusCode> {
    if req.key.trim().is_empty() {
        return Err(AppError::Validation("setting key must not be empty".to_string()));
    }
    validate_setting_value(&req.key, &req.value)?;
    db::settings::upsert(&state.pool, &req.key, &req.value).await?;
    state.settings.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

/// Per-key validation for `PATCH /admin/settings` (SPEC_FULL.md §7): keys
/// with a known shape are checked before being written; unrecognized keys
/// pass through unvalidated so operators can extend the settings table
/// without a matching code change.
fn validate_setting_value(key: &str, value: &str) -> AppResult<()> {
    match key {
        "card_count" => {
            let parsed: i32 = value
                .trim()
                .parse()
                .map_err(|_| AppError::Validation(format!("card_count must be an integer, got '{value}'")))?;
            validation::validate_card_count(parsed)
        }
        "round_duration_seconds" => {
            let parsed: i64 = value.trim().parse().map_err(|_| {
                AppError::Validation(format!(
                    "round_duration_seconds must be an integer, got '{value}'"
                ))
            })?;
            validation::validate_round_duration_seconds(parsed)
        }
        "operating_window_start" | "operating_window_end" => validation::validate_hhmm(value),
        _ => Ok(()),
    }
}

pub async fn admin_metrics(State(state): State<AppState>) -> Json<crate::metrics::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
