pub mod error;
pub mod handlers;
pub mod reports;
pub mod types;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::security::auth_api::admin_only_middleware;

pub use error::DashboardsError;
pub use handlers::*;
pub use types::*;

pub fn configure_dashboards_routes() -> Router<Arc<AppState>> {
    let reports = Router::new()
        .route("/api/reports/tickets", get(handle_ticket_report))
        .route_layer(middleware::from_fn(admin_only_middleware));

    Router::new()
        .route("/api/dashboard", get(handle_get_dashboard))
        .merge(reports)
}
