//! Subscription ledger and idempotency guard
//!
//! The authoritative transition engine. The invariant "at most one ACTIVE
//! subscription per user at any instant" is enforced here by running the
//! dedup claim and the cancel-then-insert transition in one transaction,
//! serialized per user with an advisory lock; a partial unique index on
//! `(user_id) WHERE status = 'active'` backstops it at the schema level.
//!
//! Cancel-then-insert (rather than update-tier-in-place) keeps a clean
//! historical trail: "what tier did the user have on day X" is a range query.

use clipforge_shared::{PaymentStatus, Subscription};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::event::{PaymentEvent, PaymentOutcome};

/// Result of applying a canonical payment event
#[derive(Debug)]
pub enum LedgerOutcome {
    /// A new subscription was granted in this call
    Granted(Subscription),
    /// The `(provider, external_txn_id)` pair was already applied; nothing
    /// mutated. Carries the user's current active subscription, if any.
    AlreadyApplied(Option<Subscription>),
    /// The provider reported a failed payment; only the rejected payment
    /// record was written.
    FailureRecorded,
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, tier, status, period_start, period_end, \
     cancel_at_period_end, created_at, updated_at";

#[derive(Clone)]
pub struct SubscriptionLedger {
    pool: PgPool,
}

impl SubscriptionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply a canonical payment event: dedup claim, then (on success)
    /// cancel every existing ACTIVE row for the user and insert a fresh one.
    ///
    /// Runs as a single atomic unit. Two concurrent events for the same user
    /// serialize on the per-user advisory lock, so "cancel old, insert new"
    /// never interleaves into two simultaneous ACTIVE rows. Redeliveries of
    /// the same external transaction id fall out at the dedup claim before
    /// any subscription mutation.
    pub async fn apply_payment_event(&self, event: &PaymentEvent) -> LedgerResult<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;

        Self::lock_user(&mut tx, event.user_id).await?;

        let status = match event.outcome {
            PaymentOutcome::Succeeded => PaymentStatus::Approved,
            PaymentOutcome::Failed => PaymentStatus::Rejected,
        };
        // The external transaction id appears verbatim in the description so
        // the record can be traced back in the provider's dashboard.
        let source_description = format!("{} {}", event.provider, event.external_txn_id);

        // Atomic dedup claim: the partial unique index on
        // (provider, external_txn_id) means exactly one concurrent caller
        // gets a row back. No row = someone else already applied this event.
        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO payment_records
                (id, user_id, provider, external_txn_id, amount_minor_units,
                 currency, status, tier, source_description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (provider, external_txn_id) WHERE external_txn_id IS NOT NULL
                DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.user_id)
        .bind(event.provider)
        .bind(&event.external_txn_id)
        .bind(event.amount_minor_units)
        .bind(&event.currency)
        .bind(status)
        .bind(event.tier)
        .bind(&source_description)
        .fetch_optional(&mut *tx)
        .await?;

        if claimed.is_none() {
            tx.rollback().await?;
            tracing::info!(
                provider = %event.provider,
                external_txn_id = %event.external_txn_id,
                user_id = %event.user_id,
                "Duplicate payment event, no mutation"
            );
            let existing = self.get_active_subscription(event.user_id).await?;
            return Ok(LedgerOutcome::AlreadyApplied(existing));
        }

        if event.outcome == PaymentOutcome::Failed {
            tx.commit().await?;
            tracing::info!(
                provider = %event.provider,
                external_txn_id = %event.external_txn_id,
                user_id = %event.user_id,
                "Failed payment recorded, no subscription mutation"
            );
            return Ok(LedgerOutcome::FailureRecorded);
        }

        let subscription = Self::grant_in_tx(&mut tx, event.user_id, event.tier.to_string()).await?;
        tx.commit().await?;

        tracing::info!(
            provider = %event.provider,
            external_txn_id = %event.external_txn_id,
            user_id = %event.user_id,
            tier = %event.tier,
            subscription_id = %subscription.id,
            "Subscription granted"
        );
        Ok(LedgerOutcome::Granted(subscription))
    }

    /// The write-free read other subsystems consume (quota checks, billing
    /// display).
    pub async fn get_active_subscription(
        &self,
        user_id: Uuid,
    ) -> LedgerResult<Option<Subscription>> {
        let subscription: Option<Subscription> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND status = 'active'"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    /// Serialize all subscription transitions for one user, across process
    /// instances. Released automatically at transaction end.
    pub(crate) async fn lock_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> LedgerResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Cancel every ACTIVE row for the user and insert a fresh ACTIVE row.
    /// Caller must hold the per-user lock and commit the transaction.
    pub(crate) async fn grant_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        tier: String,
    ) -> LedgerResult<Subscription> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', cancel_at_period_end = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND status = 'active'
            "#,
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        let subscription: Subscription = sqlx::query_as(&format!(
            r#"
            INSERT INTO subscriptions
                (id, user_id, tier, status, period_start, period_end, cancel_at_period_end)
            VALUES ($1, $2, $3, 'active', NOW(), NOW() + INTERVAL '30 days', FALSE)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(tier)
        .fetch_one(&mut **tx)
        .await?;

        Ok(subscription)
    }
}
