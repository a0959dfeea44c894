use std::panic;
use std::sync::Arc;

use colab_session::{build_router, config::Config, AppState};
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration
    let config_result = Config::load();
    let log_level = config_result
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to the configured level, but allow debug for our app
            format!("colab_session=debug,tower_http=debug,axum::rejection=trace,{}", log_level).into()
        }))
        .init();

    info!("Starting server...");

    let config = config_result.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    if config.cloud_auth_jwt_secret.is_none() {
        warn!("No JWT secret configured - participant ids are trusted as given");
    }

    let address = config.server_address();
    let service_name = config.cloud_service_name.clone();
    let app_routes = build_router(Arc::new(AppState::new(config)));

    // Start the HTTP/WebSocket server
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", address, e);
            std::process::exit(1);
        }
    };

    info!("🚀 {} running on http://{}", service_name, address);
    info!("📡 WebSocket available at ws://{}/api/collaboration/{{document_id}}/ws/{{user_id}}", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app_routes)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }
    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
