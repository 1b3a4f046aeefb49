use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use concord_server::{AppState, ConcordConfig, handlers};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("concord=info,tower_http=info")),
        )
        .init();

    let state_dir = std::env::var("CONCORD_STATE_DIR").unwrap_or_else(|_| ".concord".to_string());
    let config = ConcordConfig::load(std::path::Path::new(&state_dir))
        .context("Failed to load configuration")?;
    let bind_addr = config.bind_addr.clone();

    let state = AppState::new(config);
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "concord listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
