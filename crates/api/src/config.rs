//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,

    // Card wallet provider
    pub card_wallet_webhook_secret: String,

    // Order capture provider
    pub order_capture_api_base: String,
    pub order_capture_client_id: String,
    pub order_capture_client_secret: String,

    // Redirect / local payment methods aggregator
    pub redirect_local_api_base: String,
    pub redirect_local_api_key: String,
    pub redirect_local_webhook_secret: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Provider secrets default to empty strings; the verifiers fail closed
    /// on an empty secret, so an unconfigured provider rejects all traffic
    /// rather than accepting it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },

            // Card wallet provider
            card_wallet_webhook_secret: env::var("CARD_WALLET_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "".to_string()),

            // Order capture provider
            order_capture_api_base: env::var("ORDER_CAPTURE_API_BASE")
                .unwrap_or_else(|_| "https://api.sandbox.paypal.com".to_string()),
            order_capture_client_id: env::var("ORDER_CAPTURE_CLIENT_ID")
                .unwrap_or_else(|_| "".to_string()),
            order_capture_client_secret: env::var("ORDER_CAPTURE_CLIENT_SECRET")
                .unwrap_or_else(|_| "".to_string()),

            // Redirect / local payment methods aggregator
            redirect_local_api_base: env::var("REDIRECT_LOCAL_API_BASE")
                .unwrap_or_else(|_| "".to_string()),
            redirect_local_api_key: env::var("REDIRECT_LOCAL_API_KEY")
                .unwrap_or_else(|_| "".to_string()),
            redirect_local_webhook_secret: env::var("REDIRECT_LOCAL_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "".to_string()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
