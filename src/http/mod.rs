//! HTTP Surface (spec.md §6).
//!
//! Thin axum adapter over the domain services: every handler parses its
//! request, calls into `betting`/`claim`/`settlement`/`db`, and maps the
//! typed [`crate::errors::AppError`] straight through `IntoResponse`.

pub mod dto;
mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, patch, post};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_ID_HEADER: &str = "x-request-id";

use crate::metrics::Metrics;
use crate::settings::SettingsCache;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<SettingsCache>,
    pub metrics: Arc<Metrics>,
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let player_routes = Router::new()
        .route("/bets/place", post(handlers::place_bet))
        .route("/bets/claim", post(handlers::claim_bet))
        .route("/bets/cancel", post(handlers::cancel_bet))
        .route("/bets/slip/:identifier", get(handlers::get_slip))
        .route("/games/current", get(handlers::get_current_round))
        .route("/games/previous", get(handlers::get_previous_round))
        .route("/games/:round_id", get(handlers::get_round))
        .route("/wallet/summary", get(handlers::wallet_summary));

    let admin_routes = Router::new()
        .route("/admin/games/:round_id/settle", post(handlers::admin_settle_round))
        .route(
            "/admin/games/:round_id/settlement-preview",
            get(handlers::admin_settlement_preview),
        )
        .route("/admin/settings", patch(handlers::admin_update_setting))
        .route("/admin/metrics", get(handlers::admin_metrics));

    let header_name = axum::http::HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(player_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::new(header_name.clone()))
        .layer(SetRequestIdLayer::new(header_name, MakeRequestUuid))
}
