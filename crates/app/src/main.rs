use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod error;
mod routes;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let config = config::Config::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        llm_model = %config.llm_model,
        embedding_model = %config.embedding_model,
        "rag-chat-api boot"
    );

    let state = state::AppState::new(&config).await?;
    let app = routes::create_router(state);

    let address = format!("{}:{}", config.app_host, config.app_port);
    info!(%address, "listening");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("rag-chat-api shut down");
    Ok(())
}

async fn shutdown_signal() {
    // SIGINT is enough for both local runs and container stops routed
    // through an init shim.
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install shutdown handler");
    }
}
