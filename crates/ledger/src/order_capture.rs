//! Order capture provider (pull confirmation)
//!
//! No push transport: the client finishes checkout in the provider's UI and
//! then asks us to confirm. Confirmation pulls the order from the provider's
//! REST API over an OAuth client-credentials bearer token; nothing the
//! client sends is trusted beyond the order id itself.

use async_trait::async_trait;
use clipforge_shared::PaymentProvider;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::event::{major_units_to_minor, tier_for_plan_code, PaymentEvent, PaymentOutcome};
use crate::gateway::PaymentGateway;

/// Refresh the cached token this many seconds before the provider expires it
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OrderCaptureConfig {
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    #[serde(default)]
    custom_id: Option<String>,
    amount: OrderAmount,
}

#[derive(Debug, Deserialize)]
struct OrderAmount {
    currency_code: String,
    value: String,
}

struct CachedToken {
    access_token: String,
    expires_at: OffsetDateTime,
}

pub struct OrderCaptureGateway {
    config: OrderCaptureConfig,
    client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl OrderCaptureGateway {
    pub fn new(config: OrderCaptureConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: RwLock::new(None),
        }
    }

    async fn bearer_token(&self) -> LedgerResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > OffsetDateTime::now_utc() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::ProviderApi(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = OffsetDateTime::now_utc()
            + time::Duration::seconds((token.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0));

        let mut cached = self.token.write().await;
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    async fn fetch_order(&self, order_id: &str) -> LedgerResult<OrderResponse> {
        let token = self.bearer_token().await?;
        let response = self
            .client
            .get(format!(
                "{}/v2/checkout/orders/{}",
                self.config.api_base, order_id
            ))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            reqwest::StatusCode::NOT_FOUND => {
                Err(LedgerError::RecordNotFound(format!("order {}", order_id)))
            }
            status => Err(LedgerError::ProviderApi(format!(
                "order lookup returned {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl PaymentGateway for OrderCaptureGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::OrderCapture
    }

    /// No push transport to verify
    fn verify(&self, _raw_body: &[u8], _signature_header: &str) -> LedgerResult<()> {
        Err(LedgerError::UnsupportedEvent(
            "order capture has no webhook transport".to_string(),
        ))
    }

    fn normalize(&self, _raw_body: &[u8]) -> LedgerResult<PaymentEvent> {
        Err(LedgerError::UnsupportedEvent(
            "order capture has no webhook transport".to_string(),
        ))
    }

    /// Pull the order and require COMPLETED status and a `custom_id` bound
    /// to the calling user. A mismatched `custom_id` means the caller is
    /// trying to claim someone else's order; that is an authentication
    /// failure, not a not-found.
    async fn fetch_confirmation(
        &self,
        external_id: &str,
        user_id: Uuid,
    ) -> LedgerResult<PaymentEvent> {
        let order = self.fetch_order(external_id).await?;

        if order.status != "COMPLETED" {
            tracing::info!(
                order_id = %order.id,
                status = %order.status,
                "Order not yet completed"
            );
            return Err(LedgerError::PaymentNotConfirmed);
        }

        let unit = order.purchase_units.first().ok_or_else(|| {
            LedgerError::MalformedPayload("order has no purchase units".to_string())
        })?;

        // custom_id carries "user_id:plan_code", set at order creation
        let custom_id = unit.custom_id.as_deref().ok_or_else(|| {
            LedgerError::MalformedPayload("order missing custom_id".to_string())
        })?;
        let (order_user, plan_code) = custom_id
            .split_once(':')
            .ok_or_else(|| LedgerError::MalformedPayload("malformed custom_id".to_string()))?;
        let order_user: Uuid = order_user
            .parse()
            .map_err(|_| LedgerError::MalformedPayload("malformed custom_id".to_string()))?;
        if order_user != user_id {
            tracing::warn!(
                order_id = %order.id,
                caller = %user_id,
                "Order belongs to a different user"
            );
            return Err(LedgerError::AuthenticationFailure);
        }

        Ok(PaymentEvent {
            provider: PaymentProvider::OrderCapture,
            external_txn_id: order.id,
            user_id,
            tier: tier_for_plan_code(plan_code),
            amount_minor_units: major_units_to_minor(&unit.amount.value)?,
            currency: unit.amount.currency_code.to_uppercase(),
            outcome: PaymentOutcome::Succeeded,
            raw_metadata: serde_json::json!({ "custom_id": custom_id }),
        })
    }
}
