//! Shared application state

use std::sync::Arc;

use clipforge_ledger::{OrderCaptureConfig, ReconcileConfig, ReconcileService, RedirectLocalConfig};
use sqlx::PgPool;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub reconcile: Arc<ReconcileService>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let reconcile_config = ReconcileConfig {
            card_wallet_webhook_secret: config.card_wallet_webhook_secret.clone(),
            order_capture: OrderCaptureConfig {
                api_base: config.order_capture_api_base.clone(),
                client_id: config.order_capture_client_id.clone(),
                client_secret: config.order_capture_client_secret.clone(),
            },
            redirect_local: RedirectLocalConfig {
                api_base: config.redirect_local_api_base.clone(),
                api_key: config.redirect_local_api_key.clone(),
                webhook_secret: config.redirect_local_webhook_secret.clone(),
            },
        };
        let reconcile = Arc::new(ReconcileService::new(reconcile_config, pool.clone()));
        Self {
            pool,
            config: Arc::new(config),
            reconcile,
        }
    }
}
