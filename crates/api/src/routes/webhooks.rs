//! Provider webhook endpoints
//!
//! Bodies are taken as raw bytes because signatures cover the exact wire
//! bytes; parsing happens inside the reconciliation core only after the
//! signature checks out.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::error::ApiError;
use crate::state::AppState;

fn signature_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!(header = name, "Webhook missing signature header");
            ApiError::SignatureVerificationFailed
        })
}

/// Handle card wallet webhook events
pub async fn card_wallet(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), ApiError> {
    tracing::info!(body_len = body.len(), "Card wallet webhook received");
    let signature = signature_header(&headers, "x-signature")?;

    let ack = state
        .reconcile
        .handle_card_wallet_webhook(&body, signature)
        .await?;
    Ok((StatusCode::OK, ack.body.to_string()))
}

/// Handle redirect aggregator callback events
pub async fn redirect_local(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), ApiError> {
    tracing::info!(body_len = body.len(), "Redirect callback received");
    let signature = signature_header(&headers, "x-callback-signature")?;

    let ack = state
        .reconcile
        .handle_redirect_webhook(&body, signature)
        .await?;
    Ok((StatusCode::OK, ack.body.to_string()))
}
