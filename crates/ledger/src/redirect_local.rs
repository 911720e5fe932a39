//! Redirect-based local payment methods (push callback + pull fallback)
//!
//! The aggregator posts a signed callback when a redirect flow finishes, and
//! also exposes a transaction lookup API the client-driven confirm path uses
//! when the callback has not landed yet. Amounts arrive as major-unit
//! decimal strings.

use async_trait::async_trait;
use clipforge_shared::PaymentProvider;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::event::{major_units_to_minor, tier_for_plan_code, PaymentEvent, PaymentOutcome};
use crate::gateway::PaymentGateway;
use crate::signature;

#[derive(Debug, Clone)]
pub struct RedirectLocalConfig {
    pub api_base: String,
    pub api_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct CallbackPayload {
    transaction_id: String,
    state: String,
    /// Major-unit decimal string, e.g. "29.99"
    amount: String,
    currency: String,
    customer_ref: String,
    plan_code: String,
}

pub struct RedirectLocalGateway {
    config: RedirectLocalConfig,
    client: reqwest::Client,
}

impl RedirectLocalGateway {
    pub fn new(config: RedirectLocalConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn event_from_payload(
        &self,
        payload: CallbackPayload,
        expected_user: Option<Uuid>,
    ) -> LedgerResult<PaymentEvent> {
        let outcome = match payload.state.as_str() {
            "PAID" => PaymentOutcome::Succeeded,
            "FAILED" | "EXPIRED" => PaymentOutcome::Failed,
            other => return Err(LedgerError::UnsupportedEvent(format!("state {}", other))),
        };

        let user_id: Uuid = payload.customer_ref.parse().map_err(|_| {
            LedgerError::MalformedPayload("customer_ref is not a user id".to_string())
        })?;
        if let Some(expected) = expected_user {
            if user_id != expected {
                tracing::warn!(
                    transaction_id = %payload.transaction_id,
                    caller = %expected,
                    "Transaction belongs to a different user"
                );
                return Err(LedgerError::AuthenticationFailure);
            }
        }

        Ok(PaymentEvent {
            provider: PaymentProvider::RedirectLocal,
            external_txn_id: payload.transaction_id,
            user_id,
            tier: tier_for_plan_code(&payload.plan_code),
            amount_minor_units: major_units_to_minor(&payload.amount)?,
            currency: payload.currency.to_uppercase(),
            outcome,
            raw_metadata: serde_json::json!({ "state": payload.state }),
        })
    }
}

#[async_trait]
impl PaymentGateway for RedirectLocalGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::RedirectLocal
    }

    fn verify(&self, raw_body: &[u8], signature_header: &str) -> LedgerResult<()> {
        signature::verify_body_hmac(raw_body, signature_header, &self.config.webhook_secret)
    }

    fn normalize(&self, raw_body: &[u8]) -> LedgerResult<PaymentEvent> {
        let payload: CallbackPayload = serde_json::from_slice(raw_body)
            .map_err(|e| LedgerError::MalformedPayload(format!("callback body: {}", e)))?;
        self.event_from_payload(payload, None)
    }

    /// Pull fallback for the client-driven confirm: look the session up by
    /// id and require it to have reached PAID.
    async fn fetch_confirmation(
        &self,
        external_id: &str,
        user_id: Uuid,
    ) -> LedgerResult<PaymentEvent> {
        let response = self
            .client
            .get(format!(
                "{}/v1/transactions/{}",
                self.config.api_base, external_id
            ))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let payload: CallbackPayload = match response.status() {
            status if status.is_success() => response.json().await?,
            reqwest::StatusCode::NOT_FOUND => {
                return Err(LedgerError::RecordNotFound(format!(
                    "transaction {}",
                    external_id
                )))
            }
            status => {
                return Err(LedgerError::ProviderApi(format!(
                    "transaction lookup returned {}",
                    status
                )))
            }
        };

        if payload.state == "PENDING" {
            return Err(LedgerError::PaymentNotConfirmed);
        }
        self.event_from_payload(payload, Some(user_id))
    }
}
