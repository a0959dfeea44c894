pub mod config;
pub mod docs;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod websocket;
pub mod ws;

use std::sync::Arc;

use axum::{http::HeaderValue, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use config::Config;
use docs::ApiDoc;
use routes::create_api_routes;
use ws::{ConnectionHandle, SessionRegistry};

/// State shared by every request and connection.
pub struct AppState {
    pub config: Config,
    pub registry: SessionRegistry<ConnectionHandle>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: SessionRegistry::new(),
        }
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Mount API routes
        .nest("/api", create_api_routes(state))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origin_list()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if !origins.is_empty() {
        CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
    } else if config.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}
