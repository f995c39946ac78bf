use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use crate::core::config::SlaConfig;
use crate::core::shared::enums::{TicketStatus, UserRole};
use crate::core::shared::error::DeskResult;
use crate::core::shared::models::{Category, Ticket, UserSummary};
use crate::core::shared::schema::{categories, tickets, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, DbConn};
use crate::dashboards::error::DashboardsError;
use crate::dashboards::reports::{
    average_resolution_hours, count_by_category, count_by_priority, count_by_status,
    count_first_response_breaches, count_overdue, handler_workload,
};
use crate::dashboards::types::{AdminDashboard, DashboardView, RequesterDashboard, StaffDashboard};
use crate::notifications::count_unread;
use crate::security::auth_api::AuthenticatedUser;

const RECENT_LIMIT: usize = 5;

/// Most recently updated first, at most `RECENT_LIMIT`.
pub fn most_recent(mut rows: Vec<Ticket>) -> Vec<Ticket> {
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    rows.truncate(RECENT_LIMIT);
    rows
}

fn live_tickets() -> tickets::BoxedQuery<'static, diesel::pg::Pg> {
    tickets::table
        .filter(tickets::deleted_at.is_null())
        .into_boxed()
}

fn requester_view(conn: &mut DbConn, user: &AuthenticatedUser) -> DeskResult<RequesterDashboard> {
    let own: Vec<Ticket> = live_tickets()
        .filter(tickets::creator_id.eq(user.user_id))
        .load(conn)?;
    Ok(RequesterDashboard {
        by_status: count_by_status(&own),
        recent: most_recent(own),
        unread_notifications: count_unread(conn, user.user_id)?,
    })
}

fn staff_view(
    conn: &mut DbConn,
    user: &AuthenticatedUser,
    now: DateTime<Utc>,
) -> DeskResult<StaffDashboard> {
    let assigned: Vec<Ticket> = live_tickets()
        .filter(tickets::assignee_id.eq(user.user_id))
        .load(conn)?;
    let unassigned_queue: i64 = live_tickets()
        .filter(tickets::assignee_id.is_null())
        .filter(tickets::status.eq_any(TicketStatus::ACTIVE.to_vec()))
        .count()
        .get_result(conn)?;

    Ok(StaffDashboard {
        assigned_by_status: count_by_status(&assigned),
        assigned_overdue: count_overdue(&assigned, now),
        unassigned_queue,
        recent_assigned: most_recent(assigned),
        unread_notifications: count_unread(conn, user.user_id)?,
    })
}

fn admin_view(
    conn: &mut DbConn,
    user: &AuthenticatedUser,
    sla: &SlaConfig,
    now: DateTime<Utc>,
) -> DeskResult<AdminDashboard> {
    let all: Vec<Ticket> = live_tickets().load(conn)?;
    let cats: Vec<Category> = categories::table.load(conn)?;
    let handlers: Vec<UserSummary> = users::table
        .filter(users::is_active.eq(true))
        .filter(users::role.eq_any(vec![UserRole::Staff, UserRole::Admin]))
        .select(UserSummary::as_select())
        .load(conn)?;

    let unassigned = all
        .iter()
        .filter(|t| t.assignee_id.is_none() && !t.status.is_terminal())
        .count() as i64;
    let active: Vec<Ticket> = all
        .iter()
        .filter(|t| !t.status.is_terminal())
        .cloned()
        .collect();

    Ok(AdminDashboard {
        total: all.len() as i64,
        by_status: count_by_status(&all),
        by_priority: count_by_priority(&all),
        by_category: count_by_category(&all, &cats),
        overdue: count_overdue(&all, now),
        first_response_breaches: count_first_response_breaches(&active, sla, now),
        unassigned,
        avg_resolution_hours: average_resolution_hours(&all),
        workload: handler_workload(&all, &handlers),
        unread_notifications: count_unread(conn, user.user_id)?,
    })
}

pub async fn handle_get_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<DashboardView>, DashboardsError> {
    let sla = state.config.sla.clone();
    let view = with_conn(&state.conn, move |conn| {
        let now = Utc::now();
        Ok(match user.role {
            UserRole::Admin => DashboardView::Admin(admin_view(conn, &user, &sla, now)?),
            UserRole::Staff => DashboardView::Staff(staff_view(conn, &user, now)?),
            UserRole::Student | UserRole::Lecturer => {
                DashboardView::Requester(requester_view(conn, &user)?)
            }
        })
    })
    .await?;

    Ok(Json(view))
}
