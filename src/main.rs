use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use figure_studio::{config::AppConfig, routes::{router, AppState}};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    tracing::info!(
        "Using Gemini at {} (image model: {}, text model: {})",
        config.gemini_api_base, config.image_model, config.text_model
    );
    match &config.data_dir {
        Some(dir) => tracing::info!("Persisting credential and download history under {}", dir.display()),
        None => tracing::warn!("FIGURE_STUDIO_DATA_DIR not set; credential and download history are not persisted"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config));

    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
