use anyhow::Context;
use tracing_subscriber::EnvFilter;

use sms_api::app::{self, AppState};
use sms_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sms_api=info,tower_http=info")),
        )
        .init();

    let config: AppConfig = sms_api::config::config().clone();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting SMS API in {:?} mode", config.environment);

    let store = app::build_store(&config).await.context("failed to open store")?;
    let state = AppState::new(config, store.clone()).context("failed to initialise app state")?;

    if let Some(user) = state
        .accounts
        .bootstrap(&state.config.bootstrap)
        .await
        .context("failed to provision bootstrap superadmin")?
    {
        tracing::info!(user_id = %user.id, "Provisioned bootstrap superadmin {}", user.email);
    }

    let purge = app::spawn_session_purge(store.clone());

    let bind_addr = state.config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("SMS API listening on http://{}", bind_addr);

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    purge.abort();
    store.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
