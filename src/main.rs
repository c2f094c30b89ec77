use std::net::SocketAddr;

use anyhow::Context;
use confab::{app, config::Config, db, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("confab=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        client_url = %config.client_url,
        production = config.production,
        rate_limit = ?config.rate_limit,
        google = config.google.is_some(),
        llm = config.llm.api_key.is_some(),
        "starting confab v{}",
        env!("CARGO_PKG_VERSION"),
    );

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("could not open {}", config.database_url))?;

    let bind_addr = config.bind_addr.clone();
    let app = app(AppState::new(config, db_pool)?);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("could not bind {bind_addr}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
