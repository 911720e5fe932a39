//! Provider gateway trait
//!
//! Each payment provider integration implements this trait; the orchestrator
//! talks to gateways only through it. Push-only providers implement `verify`
//! and `normalize`; pull-only providers implement `fetch_confirmation`.

use async_trait::async_trait;
use clipforge_shared::PaymentProvider;

use crate::error::{LedgerError, LedgerResult};
use crate::event::PaymentEvent;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Authenticate a pushed notification against the raw body bytes.
    /// Must be called before `normalize`; unauthenticated bytes are never
    /// parsed.
    fn verify(&self, raw_body: &[u8], signature_header: &str) -> LedgerResult<()>;

    /// Reduce an authenticated provider payload to the canonical event.
    /// Returns `UnsupportedEvent` for authentic notifications the ledger
    /// does not act on.
    fn normalize(&self, raw_body: &[u8]) -> LedgerResult<PaymentEvent>;

    /// Body to return to the provider on successful receipt
    fn acknowledge(&self) -> &'static str {
        r#"{"received":true}"#
    }

    /// Pull the authoritative state of a transaction from the provider's API
    /// and reduce it to a canonical event. Only pull-capable providers
    /// override this.
    async fn fetch_confirmation(
        &self,
        _external_id: &str,
        _user_id: uuid::Uuid,
    ) -> LedgerResult<PaymentEvent> {
        Err(LedgerError::UnsupportedEvent(
            "provider does not support pull confirmation".to_string(),
        ))
    }
}
