use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use crate::core::shared::models::{Category, Ticket};
use crate::core::shared::schema::{categories, tickets};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::dashboards::error::DashboardsError;
use crate::dashboards::reports::{resolve_range, summarize};
use crate::dashboards::types::{ReportQuery, TicketReport};
use crate::security::auth_api::{AuthenticatedUser, Permission};

pub async fn handle_ticket_report(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<TicketReport>, DashboardsError> {
    user.require(Permission::ViewReports)?;
    let now = Utc::now();
    let (from, to) = resolve_range(query.from.as_deref(), query.to.as_deref(), now)?;
    let sla = state.config.sla.clone();

    let report = with_conn(&state.conn, move |conn| {
        let rows: Vec<Ticket> = tickets::table
            .filter(tickets::deleted_at.is_null())
            .filter(
                tickets::created_at
                    .ge(from)
                    .and(tickets::created_at.lt(to))
                    .or(tickets::resolved_at.ge(from).and(tickets::resolved_at.lt(to))),
            )
            .load(conn)?;
        let cats: Vec<Category> = categories::table.load(conn)?;
        Ok(summarize(&rows, &cats, &sla, from, to, now))
    })
    .await?;

    log::debug!(
        "Report {} .. {}: {} created, {} resolved",
        report.from,
        report.to,
        report.created,
        report.resolved
    );
    Ok(Json(report))
}
