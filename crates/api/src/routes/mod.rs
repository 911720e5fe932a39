//! API routes

pub mod billing;
pub mod health;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Webhook routes authenticate via provider signatures, not bearer tokens
    let webhook_routes = Router::new()
        .route("/webhooks/card-wallet", post(webhooks::card_wallet))
        .route("/webhooks/redirect-local", post(webhooks::redirect_local));

    let billing_routes = Router::new()
        .route("/billing/orders/confirm", post(billing::confirm_order))
        .route(
            "/billing/redirect/confirm",
            post(billing::confirm_redirect_session),
        )
        .route(
            "/billing/manual/records",
            post(billing::submit_manual_receipt).get(billing::list_pending_manual_records),
        )
        .route(
            "/billing/manual/records/:id/decision",
            post(billing::decide_manual_record),
        )
        .route("/billing/subscription", get(billing::get_subscription));

    Router::new()
        .route("/health", get(health::health))
        .merge(webhook_routes)
        .merge(billing_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
