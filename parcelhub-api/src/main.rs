//! # ParcelHub API Server
//!
//! Serves the ParcelHub marketplace: parcel booking, payment settlement,
//! rider applications and their approval.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/parcelhub \
//! IDENTITY_JWT_SECRET=... PAYMENT_GATEWAY_KEY=sk_test_... \
//! cargo run -p parcelhub-api
//! ```

use parcelhub_api::{
    app::{build_router, AppState},
    config::Config,
};
use parcelhub_shared::db::{migrations::run_migrations, pool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parcelhub_api=debug,parcelhub_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "ParcelHub API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let bind_address = config.bind_address();

    let db = pool::create_pool(config.pool_config()).await?;
    run_migrations(&db).await?;

    let state = AppState::from_config(db.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::close_pool(db).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
