//! Reconciliation orchestrator
//!
//! The single entry point the HTTP layer calls. Every path runs the same
//! pipeline over a provider gateway: verify, normalize, apply to the ledger,
//! audit. Unsupported-but-authentic events are acknowledged so providers
//! stop redelivering them.

use clipforge_shared::{PaymentProvider, PaymentRecord, PlanTier, Subscription};
use sqlx::PgPool;
use uuid::Uuid;

use crate::card_wallet::CardWalletGateway;
use crate::error::{LedgerError, LedgerResult};
use crate::event::PaymentEvent;
use crate::events::{ActorType, LedgerEventLogger, LedgerEventType};
use crate::gateway::PaymentGateway;
use crate::ledger::{LedgerOutcome, SubscriptionLedger};
use crate::manual::{ManualDecision, ManualLedger, ManualOutcome};
use crate::order_capture::{OrderCaptureConfig, OrderCaptureGateway};
use crate::redirect_local::{RedirectLocalConfig, RedirectLocalGateway};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub card_wallet_webhook_secret: String,
    pub order_capture: OrderCaptureConfig,
    pub redirect_local: RedirectLocalConfig,
}

/// Response body to hand back to the provider after a webhook
#[derive(Debug)]
pub struct WebhookAck {
    pub body: &'static str,
}

pub struct ReconcileService {
    ledger: SubscriptionLedger,
    manual: ManualLedger,
    events: LedgerEventLogger,
    card_wallet: CardWalletGateway,
    order_capture: OrderCaptureGateway,
    redirect_local: RedirectLocalGateway,
}

impl ReconcileService {
    pub fn new(config: ReconcileConfig, pool: PgPool) -> Self {
        Self {
            ledger: SubscriptionLedger::new(pool.clone()),
            manual: ManualLedger::new(pool.clone()),
            events: LedgerEventLogger::new(pool),
            card_wallet: CardWalletGateway::new(config.card_wallet_webhook_secret),
            order_capture: OrderCaptureGateway::new(config.order_capture),
            redirect_local: RedirectLocalGateway::new(config.redirect_local),
        }
    }

    pub async fn handle_card_wallet_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> LedgerResult<WebhookAck> {
        self.handle_webhook(&self.card_wallet, raw_body, signature_header)
            .await
    }

    pub async fn handle_redirect_webhook(
        &self,
        raw_body: &[u8],
        signature_header: &str,
    ) -> LedgerResult<WebhookAck> {
        self.handle_webhook(&self.redirect_local, raw_body, signature_header)
            .await
    }

    /// Client-driven confirmation of an order-capture checkout
    pub async fn confirm_order(
        &self,
        order_id: &str,
        user_id: Uuid,
    ) -> LedgerResult<Subscription> {
        self.confirm_via_pull(&self.order_capture, order_id, user_id)
            .await
    }

    /// Client-driven confirmation of a redirect session, for when the
    /// aggregator callback has not arrived yet
    pub async fn confirm_redirect_session(
        &self,
        transaction_id: &str,
        user_id: Uuid,
    ) -> LedgerResult<Subscription> {
        self.confirm_via_pull(&self.redirect_local, transaction_id, user_id)
            .await
    }

    pub async fn record_manual_receipt(
        &self,
        user_id: Uuid,
        amount_minor_units: i64,
        currency: &str,
        tier: PlanTier,
        source_description: &str,
    ) -> LedgerResult<PaymentRecord> {
        let record = self
            .manual
            .record_receipt(user_id, amount_minor_units, currency, tier, source_description)
            .await?;
        self.events
            .log_best_effort(
                user_id,
                LedgerEventType::ManualReceiptRecorded,
                ActorType::User,
                serde_json::json!({ "record_id": record.id, "tier": tier.to_string() }),
            )
            .await;
        Ok(record)
    }

    pub async fn decide_manual_record(
        &self,
        record_id: Uuid,
        decision: ManualDecision,
        staff_id: Uuid,
    ) -> LedgerResult<ManualOutcome> {
        let outcome = self.manual.decide(record_id, decision, staff_id).await?;
        match &outcome {
            ManualOutcome::Approved(subscription) => {
                self.events
                    .log_best_effort(
                        subscription.user_id,
                        LedgerEventType::ManualApproved,
                        ActorType::Staff,
                        serde_json::json!({
                            "record_id": record_id,
                            "staff_id": staff_id,
                            "subscription_id": subscription.id,
                        }),
                    )
                    .await;
            }
            ManualOutcome::Rejected => {
                if let Some(record) = self.manual.get_record(record_id).await? {
                    self.events
                        .log_best_effort(
                            record.user_id,
                            LedgerEventType::ManualRejected,
                            ActorType::Staff,
                            serde_json::json!({ "record_id": record_id, "staff_id": staff_id }),
                        )
                        .await;
                }
            }
            ManualOutcome::AlreadyDecided(_) => {}
        }
        Ok(outcome)
    }

    pub async fn list_pending_manual_records(&self) -> LedgerResult<Vec<PaymentRecord>> {
        self.manual.list_pending().await
    }

    pub async fn active_subscription(
        &self,
        user_id: Uuid,
    ) -> LedgerResult<Option<Subscription>> {
        self.ledger.get_active_subscription(user_id).await
    }

    async fn handle_webhook(
        &self,
        gateway: &dyn PaymentGateway,
        raw_body: &[u8],
        signature_header: &str,
    ) -> LedgerResult<WebhookAck> {
        gateway.verify(raw_body, signature_header)?;

        let event = match gateway.normalize(raw_body) {
            Ok(event) => event,
            Err(LedgerError::UnsupportedEvent(kind)) => {
                // Authentic but not actionable. Ack so the provider stops
                // redelivering.
                tracing::info!(
                    provider = %gateway.provider(),
                    event_kind = %kind,
                    "Acknowledging unsupported event"
                );
                return Ok(WebhookAck {
                    body: gateway.acknowledge(),
                });
            }
            Err(e) => return Err(e),
        };

        self.apply_and_audit(&event, ActorType::Provider).await?;
        Ok(WebhookAck {
            body: gateway.acknowledge(),
        })
    }

    /// Pull-based confirm shared by order capture and redirect sessions.
    /// Duplicate confirms are fine: the caller still gets the subscription
    /// the original event granted.
    async fn confirm_via_pull(
        &self,
        gateway: &dyn PaymentGateway,
        external_id: &str,
        user_id: Uuid,
    ) -> LedgerResult<Subscription> {
        let event = gateway.fetch_confirmation(external_id, user_id).await?;
        match self.apply_and_audit(&event, ActorType::User).await? {
            LedgerOutcome::Granted(subscription) => Ok(subscription),
            LedgerOutcome::AlreadyApplied(Some(subscription)) => Ok(subscription),
            LedgerOutcome::AlreadyApplied(None) => Err(LedgerError::RecordNotFound(format!(
                "no active subscription for confirmed payment {}",
                external_id
            ))),
            LedgerOutcome::FailureRecorded => Err(LedgerError::PaymentNotConfirmed),
        }
    }

    async fn apply_and_audit(
        &self,
        event: &PaymentEvent,
        actor: ActorType,
    ) -> LedgerResult<LedgerOutcome> {
        let outcome = self.ledger.apply_payment_event(event).await?;

        let (event_type, data) = match &outcome {
            LedgerOutcome::Granted(subscription) => (
                LedgerEventType::SubscriptionGranted,
                serde_json::json!({
                    "provider": event.provider.to_string(),
                    "external_txn_id": event.external_txn_id,
                    "subscription_id": subscription.id,
                    "tier": event.tier.to_string(),
                }),
            ),
            LedgerOutcome::AlreadyApplied(_) => (
                LedgerEventType::DuplicateSuppressed,
                serde_json::json!({
                    "provider": event.provider.to_string(),
                    "external_txn_id": event.external_txn_id,
                }),
            ),
            LedgerOutcome::FailureRecorded => (
                LedgerEventType::PaymentFailed,
                serde_json::json!({
                    "provider": event.provider.to_string(),
                    "external_txn_id": event.external_txn_id,
                }),
            ),
        };
        self.events
            .log_best_effort(event.user_id, event_type, actor, data)
            .await;
        Ok(outcome)
    }
}

impl std::fmt::Debug for ReconcileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileService")
            .field("providers", &[
                PaymentProvider::CardWallet,
                PaymentProvider::OrderCapture,
                PaymentProvider::RedirectLocal,
                PaymentProvider::Manual,
            ])
            .finish()
    }
}
