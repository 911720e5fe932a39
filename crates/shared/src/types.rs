//! Common types used across Clipforge

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Paid plan tier controlling generation quotas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Basic,
    Standard,
    Premium,
}

impl PlanTier {
    /// Monthly video-generation quota for this tier
    pub fn monthly_generations(&self) -> u32 {
        match self {
            Self::Basic => 30,
            Self::Standard => 120,
            Self::Premium => 500,
        }
    }

    /// Whether exports skip the watermark
    pub fn watermark_free(&self) -> bool {
        matches!(self, Self::Standard | Self::Premium)
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Standard => write!(f, "standard"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            _ => Err(format!("Invalid plan tier: {}", s)),
        }
    }
}

/// Subscription status
///
/// A user re-enters Active via a new row, never by reviving a canceled one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Payment record status, set once at creation from the provider outcome.
/// Manual-channel records start Pending and are decided by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Payment rail an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    CardWallet,
    OrderCapture,
    RedirectLocal,
    Manual,
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CardWallet => write!(f, "card_wallet"),
            Self::OrderCapture => write!(f, "order_capture"),
            Self::RedirectLocal => write!(f, "redirect_local"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "card_wallet" => Ok(Self::CardWallet),
            "order_capture" => Ok(Self::OrderCapture),
            "redirect_local" => Ok(Self::RedirectLocal),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Invalid payment provider: {}", s)),
        }
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Subscription model
///
/// A grant of a plan tier to a user for a 30-day window. Rows are append-only
/// for the reconciliation core: a tier change cancels the old row and inserts
/// a fresh one, so "what tier did the user have on day X" stays answerable by
/// range query.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: PlanTier,
    pub status: SubscriptionStatus,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub cancel_at_period_end: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Payment record model
///
/// Audit entry of money received, independent of subscription state. For
/// provider-originated records `external_txn_id` carries the provider's own
/// reference and `(provider, external_txn_id)` is the dedup key; the same id
/// also appears verbatim in `source_description` for dashboard lookups.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: PaymentProvider,
    pub external_txn_id: Option<String>,
    pub amount_minor_units: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Tier the payment grants. Manual receipts need this at decision time;
    /// provider events carry it for the audit trail.
    pub tier: Option<PlanTier>,
    pub source_description: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Tests
// =============================================================================
