//! Ledger audit trail
//!
//! Append-only record of every reconciliation decision. Writes are
//! best-effort from callers: a failed audit insert is logged and swallowed
//! so it never rolls back a committed grant.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::LedgerResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEventType {
    SubscriptionGranted,
    DuplicateSuppressed,
    PaymentFailed,
    ManualReceiptRecorded,
    ManualApproved,
    ManualRejected,
}

impl std::fmt::Display for LedgerEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerEventType::SubscriptionGranted => "SUBSCRIPTION_GRANTED",
            LedgerEventType::DuplicateSuppressed => "DUPLICATE_SUPPRESSED",
            LedgerEventType::PaymentFailed => "PAYMENT_FAILED",
            LedgerEventType::ManualReceiptRecorded => "MANUAL_RECEIPT_RECORDED",
            LedgerEventType::ManualApproved => "MANUAL_APPROVED",
            LedgerEventType::ManualRejected => "MANUAL_REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Who initiated the change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorType {
    User,
    Staff,
    Provider,
    System,
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorType::User => "user",
            ActorType::Staff => "staff",
            ActorType::Provider => "provider",
            ActorType::System => "system",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone)]
pub struct LedgerEventLogger {
    pool: PgPool,
}

impl LedgerEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert one audit row. Callers that must not fail on audit problems
    /// should go through [`log_best_effort`](Self::log_best_effort).
    pub async fn log(
        &self,
        user_id: Uuid,
        event_type: LedgerEventType,
        actor: ActorType,
        event_data: Value,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ledger_events (id, user_id, event_type, actor_type, event_data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_type.to_string())
        .bind(actor.to_string())
        .bind(event_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The audit trail is an observability aid, not part of the transition's
    /// atomicity. Failures here are warned and dropped.
    pub async fn log_best_effort(
        &self,
        user_id: Uuid,
        event_type: LedgerEventType,
        actor: ActorType,
        event_data: Value,
    ) {
        if let Err(e) = self.log(user_id, event_type, actor, event_data).await {
            tracing::warn!(
                user_id = %user_id,
                event_type = %event_type,
                error = %e,
                "Failed to write ledger audit event"
            );
        }
    }
}
