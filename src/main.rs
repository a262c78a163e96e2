mod agent;
mod config;
mod errors;
mod models;
mod routes;
mod service;

use tracing::info;

use crate::agent::CompletionAgent;
use crate::config::Config;
use crate::routes::{router, STREAM_PATH};
use crate::service::chat_service::ChatService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=debug,tower_http=debug".into()),
        )
        .init();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Config::from_env()?;

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let agent = CompletionAgent::new(&config.upstream)?;
    info!(
        model = %config.upstream.model,
        upstream = %config.upstream.base_url,
        "Upstream completion API configured"
    );
    let chat_service = ChatService::new(agent, config.default_system_prompt.as_str());

    // ── Router ────────────────────────────────────────────────────────────────
    let app = router(chat_service, &config.static_dir);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/ (chat stream at POST {STREAM_PATH})");

    axum::serve(listener, app).await?;
    Ok(())
}
