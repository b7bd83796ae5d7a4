use production_quality_manager::{
    api::{build_router, AppState},
    config::Config,
    ml::ModelRegistry,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });
    let config = Arc::new(config);

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.env_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Production Quality Manager v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize the model registry; serving starts either way
    let registry = Arc::new(ModelRegistry::new(config.model.clone()));
    if let Err(e) = registry.load_or_train().await {
        tracing::warn!("Model startup load failed: {}", e);
        tracing::warn!("Continuing with heuristic fallback");
    }
    if registry.is_loaded().await {
        tracing::info!("Model bundle loaded and serving");
    } else {
        tracing::info!("No model bundle available, serving heuristic fallback");
    }

    // Create application state and router
    let app_state = AppState::new(registry, config.clone());
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Prediction: http://{}/predict", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
