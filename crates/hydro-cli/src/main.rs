use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hydro_config::AppConfig;
use hydro_db::{DbClient, DbConnectionBuilder};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config
    let cfg = AppConfig::load().context("failed to load configuration")?;

    // Observability
    hydro_obs::init("hydrod", cfg.log_json(), cfg.log_filter());

    // Backend
    let url = cfg.require_backend()?;
    let mut builder = DbConnectionBuilder::from_url(url);
    if let Some(credential) = cfg.database_credential() {
        builder = builder.password(credential);
    }
    let db = DbClient::with_options(builder.build()?, cfg.max_connections())
        .await
        .context("failed to connect to readings database")?;

    // Build app and state
    let (app, state) = hydro_cli::build_app(Arc::new(db))?;

    // Start HTTP server
    let http_bind = cfg.http_bind();
    let addr: SocketAddr = http_bind
        .parse()
        .with_context(|| format!("invalid HTTP bind address {http_bind}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;

    // Mark ready just before serving
    hydro_cli::set_ready(&state, true);

    tracing::info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
