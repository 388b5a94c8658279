use anyhow::Context;
use clap::Parser;
use orbfield_server::{AppState, ServerConfig, router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into()),
        )
        .init();

    let root = config
        .root
        .canonicalize()
        .with_context(|| format!("module root {} not found", config.root.display()))?;
    info!("Serving modules from: {}", root.display());

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Started server: http://{addr}");

    axum::serve(listener, router(AppState::new(root)))
        .await
        .context("server error")?;
    Ok(())
}
