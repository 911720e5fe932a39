//! Clipforge API server entry point

use clipforge_api::{routes, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        bind_address = %config.bind_address,
        public_url = %config.public_url,
        "Starting Clipforge API"
    );

    let pool = clipforge_shared::create_pool(
        &config.database_url,
        config.database_max_connections,
    )
    .await?;
    clipforge_shared::run_migrations(&pool).await?;

    let bind_address = config.bind_address.clone();
    let state = AppState::new(config, pool);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}
