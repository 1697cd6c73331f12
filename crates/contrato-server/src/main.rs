mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use contrato_api::{AppStateInner, InFlight, router};
use contrato_db::Database;
use contrato_notify::{Dispatcher, MailerConfig};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contrato=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = ServerConfig::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("CONTRATO_JWT_SECRET is unset or still a placeholder; set a random value before deploying");
    }
    let mailer_config = MailerConfig::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;

    // Shared state
    let dispatcher = Dispatcher::from_config(mailer_config.as_ref())?;
    let state = Arc::new(AppStateInner {
        db,
        dispatcher,
        jwt_secret: config.jwt_secret.clone(),
        public_url: config.public_url.clone(),
        in_flight: InFlight::default(),
    });

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Contrato+ server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
