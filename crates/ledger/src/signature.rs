//! Webhook signature verification
//!
//! Stateless HMAC-SHA256 checks over the raw (unparsed) request body.
//! Verifying against a re-serialized body is a bug: re-serialization is not
//! guaranteed byte-identical, so callers must hand over exactly the bytes
//! received on the wire.
//!
//! All checks fail closed: an empty or unconfigured secret is a rejection,
//! never a bypass.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{LedgerError, LedgerResult};

type HmacSha256 = Hmac<Sha256>;

/// Replay window for timestamped signatures
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Verify a timestamped signature header of the form
/// `t=<unix>,v1=<hex>[,v1=<hex>...]`.
///
/// The signed payload is `"{t}." + raw_body`. The header may carry several
/// `v1` candidates (providers include old-secret signatures during secret
/// rotation); authenticity holds if any candidate matches.
pub fn verify_timestamped(
    raw_body: &[u8],
    signature_header: &str,
    secret: &str,
) -> LedgerResult<()> {
    if secret.is_empty() {
        return Err(LedgerError::AuthenticationFailure);
    }

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(LedgerError::AuthenticationFailure)?;
    if candidates.is_empty() {
        return Err(LedgerError::AuthenticationFailure);
    }

    // checked_sub: the timestamp is attacker-controlled and may sit at the
    // i64 extremes, which must reject rather than overflow.
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let age = now
        .checked_sub(timestamp)
        .ok_or(LedgerError::AuthenticationFailure)?;
    if !(-TIMESTAMP_TOLERANCE_SECS..=TIMESTAMP_TOLERANCE_SECS).contains(&age) {
        return Err(LedgerError::AuthenticationFailure);
    }

    let prefix = format!("{}.", timestamp);
    for candidate in candidates {
        let Ok(decoded) = hex::decode(candidate) else {
            continue;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return Err(LedgerError::AuthenticationFailure);
        };
        mac.update(prefix.as_bytes());
        mac.update(raw_body);
        // verify_slice is constant-time
        if mac.verify_slice(&decoded).is_ok() {
            return Ok(());
        }
    }

    Err(LedgerError::AuthenticationFailure)
}

/// Verify a plain body-HMAC header: one or more comma-separated candidates,
/// each either a bare hex digest or `sig=<hex>`.
pub fn verify_body_hmac(raw_body: &[u8], signature_header: &str, secret: &str) -> LedgerResult<()> {
    if secret.is_empty() {
        return Err(LedgerError::AuthenticationFailure);
    }

    for part in signature_header.split(',') {
        let candidate = match part.trim().split_once('=') {
            Some((_, value)) => value,
            None => part.trim(),
        };
        if candidate.is_empty() {
            continue;
        }

        let Ok(decoded) = hex::decode(candidate) else {
            continue;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return Err(LedgerError::AuthenticationFailure);
        };
        mac.update(raw_body);
        if mac.verify_slice(&decoded).is_ok() {
            return Ok(());
        }
    }

    Err(LedgerError::AuthenticationFailure)
}
