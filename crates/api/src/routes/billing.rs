//! Billing endpoints
//!
//! Client-driven payment confirmation, the manual payment channel, and
//! subscription reads. All endpoints here require a bearer token; the manual
//! decision endpoint additionally requires the staff flag.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use clipforge_ledger::{major_units_to_minor, tier_for_plan_code, ManualDecision, ManualOutcome};
use clipforge_shared::{PaymentRecord, Subscription};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub tier: String,
    pub status: String,
    pub period_start: String,
    pub period_end: String,
    pub monthly_generations: u32,
    pub watermark_free: bool,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            tier: sub.tier.to_string(),
            status: sub.status.to_string(),
            period_start: sub.period_start.format(&Rfc3339).unwrap_or_default(),
            period_end: sub.period_end.format(&Rfc3339).unwrap_or_default(),
            monthly_generations: sub.tier.monthly_generations(),
            watermark_free: sub.tier.watermark_free(),
        }
    }
}

/// Envelope for the pull-confirmation endpoints: the browser redirect
/// handler branches on `success` before reading the subscription.
#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub subscription: SubscriptionResponse,
}

impl From<Subscription> for ConfirmResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            success: true,
            subscription: sub.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentRecordResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub status: String,
    pub tier: Option<String>,
    pub source_description: String,
    pub created_at: String,
}

impl From<PaymentRecord> for PaymentRecordResponse {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            provider: record.provider.to_string(),
            amount_minor_units: record.amount_minor_units,
            currency: record.currency,
            status: record.status.to_string(),
            tier: record.tier.map(|t| t.to_string()),
            source_description: record.source_description,
            created_at: record.created_at.format(&Rfc3339).unwrap_or_default(),
        }
    }
}

// ============================================================================
// Client-driven confirmation
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ConfirmOrderRequest {
    pub order_id: String,
}

/// Confirm an order-capture checkout and grant the subscription
pub async fn confirm_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ConfirmOrderRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    if request.order_id.trim().is_empty() {
        return Err(ApiError::BadRequest("order_id must not be empty".to_string()));
    }
    let subscription = state
        .reconcile
        .confirm_order(&request.order_id, user.user_id)
        .await?;
    Ok(Json(subscription.into()))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRedirectRequest {
    pub transaction_id: String,
}

/// Confirm a redirect session when the aggregator callback has not landed yet
pub async fn confirm_redirect_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ConfirmRedirectRequest>,
) -> ApiResult<Json<ConfirmResponse>> {
    if request.transaction_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "transaction_id must not be empty".to_string(),
        ));
    }
    let subscription = state
        .reconcile
        .confirm_redirect_session(&request.transaction_id, user.user_id)
        .await?;
    Ok(Json(subscription.into()))
}

// ============================================================================
// Manual payment channel
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ManualReceiptRequest {
    /// Major-unit decimal string, e.g. "29.99"
    pub amount: String,
    pub currency: String,
    pub plan_code: String,
    pub description: String,
}

/// Submit a manual payment receipt for staff review
pub async fn submit_manual_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<ManualReceiptRequest>,
) -> ApiResult<(StatusCode, Json<PaymentRecordResponse>)> {
    if request.currency.trim().is_empty() {
        return Err(ApiError::BadRequest("currency must not be empty".to_string()));
    }
    let amount_minor_units = major_units_to_minor(&request.amount)?;
    let tier = tier_for_plan_code(&request.plan_code);

    let record = state
        .reconcile
        .record_manual_receipt(
            user.user_id,
            amount_minor_units,
            &request.currency,
            tier,
            &request.description,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Pending manual records for the staff review queue
pub async fn list_pending_manual_records(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<PaymentRecordResponse>>> {
    user.require_staff()?;
    let records = state.reconcile.list_pending_manual_records().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ManualDecisionRequest {
    pub decision: ManualDecision,
}

#[derive(Debug, Serialize)]
pub struct ManualDecisionResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionResponse>,
}

/// Approve or reject a pending manual record
pub async fn decide_manual_record(
    State(state): State<AppState>,
    user: AuthUser,
    Path(record_id): Path<Uuid>,
    Json(request): Json<ManualDecisionRequest>,
) -> ApiResult<Json<ManualDecisionResponse>> {
    user.require_staff()?;

    let outcome = state
        .reconcile
        .decide_manual_record(record_id, request.decision, user.user_id)
        .await?;

    let response = match outcome {
        ManualOutcome::Approved(subscription) => ManualDecisionResponse {
            status: "approved".to_string(),
            subscription: Some(subscription.into()),
        },
        ManualOutcome::Rejected => ManualDecisionResponse {
            status: "rejected".to_string(),
            subscription: None,
        },
        ManualOutcome::AlreadyDecided(status) => ManualDecisionResponse {
            status: format!("already_{}", status),
            subscription: None,
        },
    };
    Ok(Json(response))
}

// ============================================================================
// Subscription reads
// ============================================================================

/// The caller's current active subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<SubscriptionResponse>> {
    let subscription = state
        .reconcile
        .active_subscription(user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(subscription.into()))
}
