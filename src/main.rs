use std::net::SocketAddr;

use anyhow::{Context, Result};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use watchboard::config::Config;
use watchboard::routes;
use watchboard::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env();
    let bind = cfg.bind.clone();
    let port = cfg.port;
    let static_dir = cfg.static_dir.clone();

    let state = AppState::new(cfg)?;

    // Static file serving: the dashboard build, when present, is served at
    // the root; the API lives under /api.
    let app = routes::api_router()
        .fallback_service(ServeDir::new(&static_dir).append_index_html_on_directories(true))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .context("invalid bind address")?;

    log::info!("watchboard listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    log::info!("shutdown signal received, stopping");
}
