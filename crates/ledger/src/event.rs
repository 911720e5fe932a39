//! Canonical payment event and normalization helpers
//!
//! Every provider payload is reduced to a [`PaymentEvent`] before it reaches
//! the ledger. The event is in-memory only; it exists to decouple the
//! orchestrator from provider-specific shapes and is never persisted as its
//! own entity.

use clipforge_shared::{PaymentProvider, PlanTier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Provider-reported outcome of a money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

/// Canonical, provider-agnostic payment event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub provider: PaymentProvider,
    /// The provider's own unique reference for this money movement;
    /// basis of idempotency.
    pub external_txn_id: String,
    pub user_id: Uuid,
    pub tier: PlanTier,
    pub amount_minor_units: i64,
    pub currency: String,
    pub outcome: PaymentOutcome,
    pub raw_metadata: serde_json::Value,
}

/// Map an external plan identifier (plan slug or price code) to the internal
/// tier enum.
///
/// Unrecognized identifiers fall back to the default tier instead of failing:
/// an unknown plan id must never silently reject paid traffic. The fallback is
/// logged loudly so it gets investigated.
pub fn tier_for_plan_code(code: &str) -> PlanTier {
    match code.to_lowercase().as_str() {
        "basic" | "basic_monthly" | "plan_basic" | "price_basic" => PlanTier::Basic,
        "standard" | "standard_monthly" | "plan_standard" | "price_standard" => PlanTier::Standard,
        "premium" | "premium_monthly" | "plan_premium" | "price_premium" => PlanTier::Premium,
        other => {
            tracing::warn!(
                plan_code = %other,
                fallback_tier = %PlanTier::default(),
                "Unrecognized plan identifier, applying default tier"
            );
            PlanTier::default()
        }
    }
}

/// Convert a major-unit decimal string (e.g. `"29.99"`) to integer minor
/// units, rounding half up.
///
/// Pure string arithmetic; no floats, so no drift. `"29.99"` -> 2999 and
/// `"9.995"` -> 1000. Negative, empty, or non-numeric input is rejected.
pub fn major_units_to_minor(raw: &str) -> LedgerResult<i64> {
    let s = raw.trim();
    if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
        return Err(LedgerError::MalformedPayload(format!(
            "invalid amount: {:?}",
            raw
        )));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(LedgerError::MalformedPayload(format!(
            "invalid amount: {:?}",
            raw
        )));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(LedgerError::MalformedPayload(format!(
            "invalid amount: {:?}",
            raw
        )));
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| {
            LedgerError::MalformedPayload(format!("amount out of range: {:?}", raw))
        })?
    };

    let frac = frac_part.as_bytes();
    let tens = frac.first().map(|b| i64::from(b - b'0')).unwrap_or(0);
    let units = frac.get(1).map(|b| i64::from(b - b'0')).unwrap_or(0);
    // Round half up: the truncated remainder is >= half a minor unit exactly
    // when the third fractional digit is 5 or more.
    let round_up = frac.get(2).is_some_and(|b| *b >= b'5');

    whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(tens * 10 + units))
        .and_then(|v| v.checked_add(i64::from(round_up)))
        .ok_or_else(|| LedgerError::MalformedPayload(format!("amount out of range: {:?}", raw)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]  // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;

    #[test]
    fn test_major_units_basic() {
        assert_eq!(major_units_to_minor("29.99").unwrap(), 2999);
        assert_eq!(major_units_to_minor("0.01").unwrap(), 1);
        assert_eq!(major_units_to_minor("100").unwrap(), 10000);
        assert_eq!(major_units_to_minor("7.5").unwrap(), 750);
        assert_eq!(major_units_to_minor(".5").unwrap(), 50);
        assert_eq!(major_units_to_minor("0").unwrap(), 0);
    }

    #[test]
    fn test_major_units_round_half_up() {
        assert_eq!(major_units_to_minor("9.995").unwrap(), 1000);
        assert_eq!(major_units_to_minor("9.994").unwrap(), 999);
        assert_eq!(major_units_to_minor("9.9949").unwrap(), 999);
        assert_eq!(major_units_to_minor("9.99500").unwrap(), 1000);
        assert_eq!(major_units_to_minor("0.005").unwrap(), 1);
    }

    #[test]
    fn test_major_units_rejects_garbage() {
        assert!(major_units_to_minor("").is_err());
        assert!(major_units_to_minor(".").is_err());
        assert!(major_units_to_minor("-1.00").is_err());
        assert!(major_units_to_minor("+1.00").is_err());
        assert!(major_units_to_minor("12,99").is_err());
        assert!(major_units_to_minor("abc").is_err());
        assert!(major_units_to_minor("1.2.3").is_err());
        assert!(major_units_to_minor("1e3").is_err());
    }

    #[test]
    fn test_major_units_overflow() {
        assert!(major_units_to_minor("99999999999999999999").is_err());
    }

    #[test]
    fn test_tier_for_plan_code_known() {
        assert_eq!(tier_for_plan_code("basic_monthly"), PlanTier::Basic);
        assert_eq!(tier_for_plan_code("STANDARD"), PlanTier::Standard);
        assert_eq!(tier_for_plan_code("price_premium"), PlanTier::Premium);
    }

    #[test]
    fn test_tier_for_plan_code_unknown_defaults() {
        // Unknown plan ids must not reject paid traffic
        assert_eq!(tier_for_plan_code("legacy_gold_2019"), PlanTier::default());
        assert_eq!(tier_for_plan_code(""), PlanTier::default());
    }
}
