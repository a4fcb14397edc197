use std::net::SocketAddr;
use std::path::PathBuf;

use tower_http::cors::CorsLayer;
use tracing::info;

use teampulse::api::{api_router, AppState};
use teampulse::db::DbPool;
use teampulse::error::AppResult;
use teampulse::utils::logger;

const DEFAULT_ADDR: &str = "127.0.0.1:8087";

#[tokio::main]
async fn main() -> AppResult<()> {
    let data_dir = data_dir();
    logger::init_logging(&data_dir)?;

    let db = DbPool::new(data_dir.join("teampulse.sqlite"))?;
    let state = AppState::new(db);

    let app = api_router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = std::env::var("TEAMPULSE_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .map_err(|err| teampulse::error::AppError::other(format!("监听地址非法: {err}")))?;

    info!(%addr, "server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn data_dir() -> PathBuf {
    std::env::var("TEAMPULSE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
