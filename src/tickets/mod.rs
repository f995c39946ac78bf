//! Ticket lifecycle: submission, triage, status changes, disposition,
//! conversation and attachments.

pub mod access;
pub mod attachments;
pub mod disposition;
pub mod handlers;
pub mod messages;
pub mod sla;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use access::AssignmentOutcome;
pub use disposition::{plan_disposition, DispositionPlan, DispositionRequest};
pub use handlers::{load_ticket, TicketDetail, TicketFilter};

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets",
            get(handlers::handle_list_tickets).post(handlers::handle_create_ticket),
        )
        .route("/api/tickets/overdue", get(handlers::handle_list_overdue))
        .route(
            "/api/tickets/:id",
            get(handlers::handle_get_ticket)
                .put(handlers::handle_update_ticket)
                .delete(handlers::handle_delete_ticket),
        )
        .route("/api/tickets/:id/status", put(handlers::handle_change_status))
        .route("/api/tickets/:id/resolve", put(handlers::handle_resolve_ticket))
        .route("/api/tickets/:id/close", put(handlers::handle_close_ticket))
        .route("/api/tickets/:id/reopen", put(handlers::handle_reopen_ticket))
        .route("/api/tickets/:id/assign", put(handlers::handle_assign_ticket))
        .route("/api/tickets/:id/rating", post(handlers::handle_rate_ticket))
        .route(
            "/api/tickets/:id/disposition",
            post(disposition::handle_dispose_ticket),
        )
        .route(
            "/api/tickets/:id/dispositions",
            get(disposition::handle_list_dispositions),
        )
        .route(
            "/api/tickets/:id/messages",
            get(messages::handle_list_messages).post(messages::handle_post_message),
        )
        .route(
            "/api/tickets/:id/attachments",
            get(attachments::handle_list_attachments).post(attachments::handle_upload_attachment),
        )
        .route(
            "/api/attachments/:id",
            get(attachments::handle_download_attachment),
        )
}
