//! JWT authentication
//!
//! Bearer-token auth for the client-facing billing endpoints. Webhook
//! endpoints authenticate via provider signatures instead and never go
//! through this module.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// JWT claims for Clipforge-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Staff flag for the manual review queue
    #[serde(default)]
    pub staff: bool,
    /// Expiration
    pub exp: i64,
}

/// Authenticated caller, extracted from the Authorization header
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub staff: bool,
}

impl AuthUser {
    /// Staff-only endpoints call this first
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::InvalidToken)?;

        Ok(AuthUser {
            user_id: data.claims.sub,
            staff: data.claims.staff,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]  // Allow unwrap() in tests for cleaner test code
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    #[test]
    fn test_claims_round_trip() {
        let secret = "test_jwt_secret_at_least_32_characters_long";
        let claims = Claims {
            sub: Uuid::new_v4(),
            staff: true,
            exp: OffsetDateTime::now_utc().unix_timestamp() + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, claims.sub);
        assert!(decoded.claims.staff);
    }

    #[test]
    fn test_staff_flag_defaults_false() {
        let json = format!(r#"{{"sub":"{}","exp":1}}"#, Uuid::new_v4());
        let claims: Claims = serde_json::from_str(&json).unwrap();
        assert!(!claims.staff);
    }

    #[test]
    fn test_require_staff() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            staff: false,
        };
        assert!(user.require_staff().is_err());
        let staff = AuthUser {
            user_id: Uuid::new_v4(),
            staff: true,
        };
        assert!(staff.require_staff().is_ok());
    }
}
