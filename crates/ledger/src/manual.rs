//! Manual payment channel
//!
//! Bank transfers and similar out-of-band payments. A receipt is recorded as
//! a PENDING payment record; a staff decision later approves (granting the
//! subscription) or rejects it. The decision transition is a compare-and-set
//! on the PENDING status, so each record is decided exactly once.

use clipforge_shared::{PaymentRecord, PaymentStatus, PlanTier, Subscription};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::SubscriptionLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualDecision {
    Approve,
    Reject,
}

#[derive(Debug)]
pub enum ManualOutcome {
    Approved(Subscription),
    Rejected,
    /// The record had already left PENDING before this call; carries the
    /// status it holds now.
    AlreadyDecided(PaymentStatus),
}

const RECORD_COLUMNS: &str = "id, user_id, provider, external_txn_id, amount_minor_units, \
     currency, status, tier, source_description, created_at";

#[derive(Clone)]
pub struct ManualLedger {
    pool: PgPool,
}

impl ManualLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a submitted receipt as a PENDING manual payment. No external
    /// transaction id exists for these, so the dedup index does not apply;
    /// duplicates are weeded out at decision time by staff.
    pub async fn record_receipt(
        &self,
        user_id: Uuid,
        amount_minor_units: i64,
        currency: &str,
        tier: PlanTier,
        source_description: &str,
    ) -> LedgerResult<PaymentRecord> {
        if amount_minor_units < 0 {
            return Err(LedgerError::MalformedPayload(
                "negative amount".to_string(),
            ));
        }

        let record: PaymentRecord = sqlx::query_as(&format!(
            r#"
            INSERT INTO payment_records
                (id, user_id, provider, external_txn_id, amount_minor_units,
                 currency, status, tier, source_description)
            VALUES ($1, $2, 'manual', NULL, $3, $4, 'pending', $5, $6)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(amount_minor_units)
        .bind(currency.to_uppercase())
        .bind(tier)
        .bind(source_description)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            record_id = %record.id,
            user_id = %user_id,
            tier = %tier,
            "Manual payment receipt recorded"
        );
        Ok(record)
    }

    /// Decide a pending manual record. The UPDATE only matches rows still in
    /// PENDING, so concurrent or repeated decisions collapse to exactly one
    /// winner; losers see the already-settled status.
    pub async fn decide(
        &self,
        record_id: Uuid,
        decision: ManualDecision,
        staff_id: Uuid,
    ) -> LedgerResult<ManualOutcome> {
        let new_status = match decision {
            ManualDecision::Approve => PaymentStatus::Approved,
            ManualDecision::Reject => PaymentStatus::Rejected,
        };

        let mut tx = self.pool.begin().await?;

        let claimed: Option<PaymentRecord> = sqlx::query_as(&format!(
            r#"
            UPDATE payment_records
            SET status = $1
            WHERE id = $2 AND provider = 'manual' AND status = 'pending'
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(new_status)
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = claimed else {
            tx.rollback().await?;
            let current: Option<(PaymentStatus,)> = sqlx::query_as(
                "SELECT status FROM payment_records WHERE id = $1 AND provider = 'manual'",
            )
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;
            return match current {
                Some((status,)) => {
                    tracing::info!(
                        record_id = %record_id,
                        status = ?status,
                        "Manual record already decided"
                    );
                    Ok(ManualOutcome::AlreadyDecided(status))
                }
                None => Err(LedgerError::RecordNotFound(format!(
                    "manual payment record {}",
                    record_id
                ))),
            };
        };

        if decision == ManualDecision::Reject {
            tx.commit().await?;
            tracing::info!(
                record_id = %record_id,
                staff_id = %staff_id,
                user_id = %record.user_id,
                "Manual payment rejected"
            );
            return Ok(ManualOutcome::Rejected);
        }

        let tier = record.tier.unwrap_or_else(|| {
            tracing::warn!(
                record_id = %record_id,
                "Manual record has no tier, applying default"
            );
            PlanTier::default()
        });

        SubscriptionLedger::lock_user(&mut tx, record.user_id).await?;
        let subscription =
            SubscriptionLedger::grant_in_tx(&mut tx, record.user_id, tier.to_string()).await?;
        tx.commit().await?;

        tracing::info!(
            record_id = %record_id,
            staff_id = %staff_id,
            user_id = %record.user_id,
            subscription_id = %subscription.id,
            tier = %tier,
            "Manual payment approved, subscription granted"
        );
        Ok(ManualOutcome::Approved(subscription))
    }

    /// Pending manual records, oldest first, for the staff review queue
    pub async fn list_pending(&self) -> LedgerResult<Vec<PaymentRecord>> {
        let records: Vec<PaymentRecord> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records \
             WHERE provider = 'manual' AND status = 'pending' \
             ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn get_record(&self, record_id: Uuid) -> LedgerResult<Option<PaymentRecord>> {
        let record: Option<PaymentRecord> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM payment_records WHERE id = $1"
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}
