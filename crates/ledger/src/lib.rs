//! Clipforge Payment Reconciliation Core
//!
//! Turns heterogeneous provider notifications (push webhooks, redirect
//! callbacks, pull confirmations, manual receipts) into a single consistent
//! subscription ledger. Every path runs Verifier -> Normalizer -> Idempotency
//! Guard -> Ledger, and each real-world payment is applied at most once.

pub mod card_wallet;
pub mod error;
pub mod event;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod manual;
pub mod order_capture;
pub mod reconcile;
pub mod redirect_local;
pub mod signature;

pub use card_wallet::CardWalletGateway;
pub use error::{LedgerError, LedgerResult};
pub use event::{major_units_to_minor, tier_for_plan_code, PaymentEvent, PaymentOutcome};
pub use events::{ActorType, LedgerEventLogger, LedgerEventType};
pub use gateway::PaymentGateway;
pub use ledger::{LedgerOutcome, SubscriptionLedger};
pub use manual::{ManualDecision, ManualLedger, ManualOutcome};
pub use order_capture::{OrderCaptureConfig, OrderCaptureGateway};
pub use reconcile::{ReconcileConfig, ReconcileService, WebhookAck};
pub use redirect_local::{RedirectLocalConfig, RedirectLocalGateway};
