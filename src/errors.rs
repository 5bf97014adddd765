//! Stable, typed error taxonomy for the wagering engine.
//!
//! Every service function returns `Result<_, AppError>`. The HTTP layer is
//! the only place that maps an `AppError` to a status code and JSON body;
//! the engine itself never knows about HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors that can arise while running the round lifecycle, wallet ledger,
/// bet placement, claim/cancel, or settlement pipeline.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("round is closed for new bets")]
    RoundClosed,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("slip already claimed")]
    AlreadyClaimed,

    #[error("slip is not a winning slip")]
    NotWinning,

    #[error("slip cannot be cancelled")]
    NotCancellable,

    #[error("round completed but awaiting manual winning-card decision")]
    AwaitingManual,

    #[error("settlement already in progress for this round")]
    SettlementInProgress,

    #[error("round is not ready for settlement")]
    NotReady,

    #[error("settlement failed: {0}")]
    SettlementFailed(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Stable machine-readable identifier from spec.md §7.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RoundClosed => "ROUND_CLOSED",
            AppError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            AppError::Conflict(_) => "CONFLICT",
            AppError::AlreadyClaimed => "ALREADY_CLAIMED",
            AppError::NotWinning => "NOT_WINNING",
            AppError::NotCancellable => "NOT_CANCELLABLE",
            AppError::AwaitingManual => "AWAITING_MANUAL",
            AppError::SettlementInProgress => "SETTLEMENT_IN_PROGRESS",
            AppError::NotReady => "NOT_READY",
            AppError::SettlementFailed(_) => "SETTLEMENT_FAILED",
            AppError::Internal(_) => "INTERNAL",
            AppError::Database(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RoundClosed => StatusCode::CONFLICT,
            AppError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::AlreadyClaimed => StatusCode::CONFLICT,
            AppError::NotWinning => StatusCode::CONFLICT,
            AppError::NotCancellable => StatusCode::CONFLICT,
            AppError::AwaitingManual => StatusCode::ACCEPTED,
            AppError::SettlementInProgress => StatusCode::CONFLICT,
            AppError::NotReady => StatusCode::CONFLICT,
            AppError::SettlementFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The dynamic, user-influenced part of an error, if any, sanitized
    /// before it reaches the response body's `details` field (spec.md §7).
    fn details(&self) -> Option<String> {
        let raw = match self {
            AppError::Validation(m) => m,
            AppError::NotFound(m) => m,
            AppError::Conflict(m) => m,
            AppError::SettlementFailed(m) => m,
            _ => return None,
        };
        Some(crate::validation::sanitize_for_error_details(raw))
    }

    /// Fixed, non-interpolated message for the given error kind. User-supplied
    /// identifiers never reach this string directly — see `details` instead.
    fn message(&self) -> String {
        match self {
            AppError::Validation(m) => m.clone(),
            AppError::Unauthenticated => "authentication required".to_string(),
            AppError::Forbidden => "not permitted".to_string(),
            AppError::NotFound(_) => "resource not found".to_string(),
            AppError::RoundClosed => "round is not accepting bets".to_string(),
            AppError::InsufficientFunds => "insufficient wallet balance".to_string(),
            AppError::Conflict(m) => m.clone(),
            AppError::AlreadyClaimed => "slip has already been claimed".to_string(),
            AppError::NotWinning => "slip did not win".to_string(),
            AppError::NotCancellable => "slip can no longer be cancelled".to_string(),
            AppError::AwaitingManual => "awaiting manual settlement decision".to_string(),
            AppError::SettlementInProgress => "settlement is already in progress".to_string(),
            AppError::NotReady => "round has not completed yet".to_string(),
            AppError::SettlementFailed(_) => "settlement failed; an operator must re-trigger it".to_string(),
            AppError::Internal(_) | AppError::Database(_) => "internal error".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, AppError::Internal(_) | AppError::Database(_)) {
            tracing::error!(error = %self, "internal error handling request");
        }
        let body = ErrorBody {
            code: self.code(),
            message: self.message(),
            details: self.details(),
        };
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
