use anyhow::{Context, Result};
use rekon_import::HttpCoreBankingClient;
use rekon_server::{build_router, telemetry, AppState, ServerConfig};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load().context("Failed to load configuration")?;
    telemetry::init(config.log_format).context("Failed to install tracing subscriber")?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::create_dir_all(&config.attachments_dir)
        .with_context(|| format!("Failed to create {}", config.attachments_dir.display()))?;

    let db = rekon_storage::create_db(&config.database_path)
        .await
        .context("Failed to open database")?;

    let core_api = HttpCoreBankingClient::new(config.core_api.clone())
        .context("Failed to build core banking client")?;
    info!("Core banking API: {}", config.core_api.base_url);

    let mailer = rekon_email::build_mailer(&config.mail).context("Failed to configure mail transport")?;
    info!("Mail transport: {}", mailer.name());

    let bind = config.bind.clone();
    let state = AppState::new(db, Arc::new(core_api), mailer, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!("Listening on http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
