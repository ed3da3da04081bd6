//! Router setup with all routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use advisor_core::{AdvisorConfig, AdvisorError};

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    // Routes that do NOT require authentication.
    let public_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route("/api/login", post(handlers::login));

    let protected_routes = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route(
            "/api/history",
            get(handlers::history).delete(handlers::clear_history),
        )
        .route("/api/assets", get(handlers::assets))
        .route("/api/outages", get(handlers::outages))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    let body_limit = state.config.server.max_body_bytes;

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn start_server(config: &AdvisorConfig, state: AppState) -> Result<(), AdvisorError> {
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AdvisorError::Server(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!(%addr, "Advisor gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AdvisorError::Server(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
