//! Reconciliation error types

use thiserror::Error;

/// Errors produced by the reconciliation core
///
/// Authentication and payload errors never reach the ledger; storage errors
/// during the atomic transition roll back completely, so no variant here can
/// indicate partial application.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Bad or missing signature, or an unconfigured secret. Deliberately
    /// carries no detail about which part of the check failed.
    #[error("Webhook signature verification failed")]
    AuthenticationFailure,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Event type the provider sends but this core does not act on. The
    /// orchestrator acknowledges these so the provider stops redelivering.
    #[error("Unsupported event type: {0}")]
    UnsupportedEvent(String),

    /// The provider does not (yet) report the transaction as completed.
    #[error("Payment not yet confirmed, try again")]
    PaymentNotConfirmed,

    #[error("Not found: {0}")]
    RecordNotFound(String),

    #[error("Provider API error: {0}")]
    ProviderApi(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        LedgerError::ProviderApi(err.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
