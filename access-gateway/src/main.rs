use std::time::Duration;

use access_gateway::{build_router, load_gateway_config, spawn_token_sweeper, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = load_gateway_config()?;
    let state = AppState::from_config(&config)?;
    spawn_token_sweeper(state.refresh_ledger.clone(), TOKEN_SWEEP_INTERVAL);
    let app = build_router(state);

    info!(addr = %config.addr, "starting access-gateway");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
