//! Card wallet provider (push webhooks)
//!
//! Signed event envelopes delivered over HTTP with a timestamped
//! `t=...,v1=...` signature header. Amounts arrive already in minor units.

use async_trait::async_trait;
use clipforge_shared::PaymentProvider;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::event::{tier_for_plan_code, PaymentEvent, PaymentOutcome};
use crate::gateway::PaymentGateway;
use crate::signature;

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: PaymentIntent,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: IntentMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct IntentMetadata {
    user_id: Option<String>,
    plan_code: Option<String>,
}

pub struct CardWalletGateway {
    webhook_secret: String,
}

impl CardWalletGateway {
    pub fn new(webhook_secret: String) -> Self {
        Self { webhook_secret }
    }
}

#[async_trait]
impl PaymentGateway for CardWalletGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::CardWallet
    }

    fn verify(&self, raw_body: &[u8], signature_header: &str) -> LedgerResult<()> {
        signature::verify_timestamped(raw_body, signature_header, &self.webhook_secret)
    }

    fn normalize(&self, raw_body: &[u8]) -> LedgerResult<PaymentEvent> {
        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| LedgerError::MalformedPayload(format!("webhook body: {}", e)))?;

        let outcome = match envelope.event_type.as_str() {
            "payment_intent.succeeded" => PaymentOutcome::Succeeded,
            "payment_intent.payment_failed" => PaymentOutcome::Failed,
            other => return Err(LedgerError::UnsupportedEvent(other.to_string())),
        };

        let intent = envelope.data.object;
        let user_id: Uuid = intent
            .metadata
            .user_id
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                LedgerError::MalformedPayload("missing or invalid metadata.user_id".to_string())
            })?;
        let plan_code = intent.metadata.plan_code.as_deref().ok_or_else(|| {
            LedgerError::MalformedPayload("missing metadata.plan_code".to_string())
        })?;

        if intent.amount < 0 {
            return Err(LedgerError::MalformedPayload(format!(
                "negative amount: {}",
                intent.amount
            )));
        }

        Ok(PaymentEvent {
            provider: PaymentProvider::CardWallet,
            external_txn_id: intent.id,
            user_id,
            tier: tier_for_plan_code(plan_code),
            amount_minor_units: intent.amount,
            currency: intent.currency.to_uppercase(),
            outcome,
            raw_metadata: serde_json::json!({ "event_id": envelope.id }),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]  // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use clipforge_shared::PlanTier;

    fn gateway() -> CardWalletGateway {
        CardWalletGateway::new("whsec_test".to_string())
    }

    fn success_body(user_id: &str, plan_code: &str) -> Vec<u8> {
        serde_json::json!({
            "id": "evt_123",
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_abc",
                    "amount": 2999,
                    "currency": "usd",
                    "metadata": { "user_id": user_id, "plan_code": plan_code }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_normalize_success_event() {
        let user_id = Uuid::new_v4();
        let event = gateway()
            .normalize(&success_body(&user_id.to_string(), "premium_monthly"))
            .unwrap();
        assert_eq!(event.provider, PaymentProvider::CardWallet);
        assert_eq!(event.external_txn_id, "pi_abc");
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.tier, PlanTier::Premium);
        assert_eq!(event.amount_minor_units, 2999);
        assert_eq!(event.currency, "USD");
        assert_eq!(event.outcome, PaymentOutcome::Succeeded);
    }

    #[test]
    fn test_normalize_failed_event() {
        let body = serde_json::json!({
            "id": "evt_124",
            "type": "payment_intent.payment_failed",
            "data": {
                "object": {
                    "id": "pi_def",
                    "amount": 999,
                    "currency": "usd",
                    "metadata": {
                        "user_id": Uuid::new_v4().to_string(),
                        "plan_code": "basic"
                    }
                }
            }
        })
        .to_string();
        let event = gateway().normalize(body.as_bytes()).unwrap();
        assert_eq!(event.outcome, PaymentOutcome::Failed);
    }

    #[test]
    fn test_normalize_unsupported_event_type() {
        let body = serde_json::json!({
            "id": "evt_125",
            "type": "charge.refunded",
            "data": { "object": { "id": "ch_1", "amount": 100, "currency": "usd" } }
        })
        .to_string();
        let err = gateway().normalize(body.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::UnsupportedEvent(_)));
    }

    #[test]
    fn test_normalize_missing_user_id() {
        let body = serde_json::json!({
            "id": "evt_126",
            "type": "payment_intent.succeeded",
            "data": {
                "object": {
                    "id": "pi_ghi",
                    "amount": 2999,
                    "currency": "usd",
                    "metadata": { "plan_code": "standard" }
                }
            }
        })
        .to_string();
        let err = gateway().normalize(body.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::MalformedPayload(_)));
    }

    #[test]
    fn test_normalize_garbage_body() {
        assert!(matches!(
            gateway().normalize(b"not json").unwrap_err(),
            LedgerError::MalformedPayload(_)
        ));
    }
}
