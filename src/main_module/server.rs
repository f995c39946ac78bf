//! HTTP server initialization and routing

use axum::extract::DefaultBodyLimit;
use axum::{middleware, routing::get, Router};
use log::{error, info};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::security::{auth_middleware, create_cors_layer};

use super::{health_check, health_check_simple, shutdown_signal};

/// Slack on top of the attachment limit for headers and framing.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/health", get(health_check_simple))
        .route("/api/health", get(health_check))
        .merge(crate::core::directory::configure_auth_routes())
        .merge(crate::core::directory::configure_users_routes())
        .merge(crate::categories::configure_categories_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::notifications::configure_notifications_routes())
        .merge(crate::dashboards::configure_dashboards_routes());

    let body_limit = usize::try_from(app_state.config.attachments.max_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK);
    let cors = create_cors_layer(&app_state.config.server.cors_allowed_origins);

    api_router
        // Layers run in reverse order: auth runs after CORS has answered preflights
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
