//! Disposisi: moving a ticket between handlers.
//!
//! [`plan_disposition`] decides the outcome from the current ticket and the
//! request; the handler only loads inputs and persists the plan.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::SlaConfig;
use crate::core::shared::enums::{DispositionAction, NotificationKind, TicketPriority, TicketStatus, UserRole};
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{Ticket, TicketDisposition, User};
use crate::core::shared::schema::{ticket_dispositions, tickets, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{normalize_optional, with_conn, DbConn};
use crate::notifications::{notify_ticket, recipients};
use crate::security::auth_api::{AuthenticatedUser, Permission};
use crate::tickets::access::ensure_can_view;
use crate::tickets::handlers::load_ticket;
use crate::tickets::sla::resolution_due;

#[derive(Debug, Deserialize)]
pub struct DispositionRequest {
    pub action: DispositionAction,
    pub target_user_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
    pub note: Option<String>,
}

/// A prospective assignee as the planner needs to see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    pub id: Uuid,
    pub role: UserRole,
    pub is_active: bool,
}

impl From<&User> for Handler {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionPlan {
    pub action: DispositionAction,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub status: TicketStatus,
    pub previous_priority: TicketPriority,
    pub new_priority: TicketPriority,
    pub sla_due_at: DateTime<Utc>,
}

fn ensure_active_handler(target: &Handler) -> DeskResult<()> {
    if target.role.is_handler() && target.is_active {
        Ok(())
    } else {
        Err(DeskError::validation(
            "Target must be an active staff member or administrator",
        ))
    }
}

/// `target` is the explicit target for Forward/Escalate, or the handler the
/// ticket goes back to for Return.
pub fn plan_disposition(
    actor: &AuthenticatedUser,
    ticket: &Ticket,
    action: DispositionAction,
    requested_priority: Option<TicketPriority>,
    target: Option<Handler>,
    sla: &SlaConfig,
) -> DeskResult<DispositionPlan> {
    if ticket.status.is_terminal() {
        return Err(DeskError::conflict(format!(
            "A {} ticket cannot be disposed",
            ticket.status
        )));
    }
    if !actor.is_admin() && ticket.assignee_id != Some(actor.user_id) {
        return Err(DeskError::Forbidden(
            "Only the assigned handler or an administrator can dispose this ticket".to_string(),
        ));
    }

    let moved_status = if ticket.status == TicketStatus::Open {
        TicketStatus::InProgress
    } else {
        ticket.status
    };

    let mut plan = DispositionPlan {
        action,
        from_user_id: ticket.assignee_id,
        to_user_id: ticket.assignee_id,
        status: ticket.status,
        previous_priority: ticket.priority,
        new_priority: ticket.priority,
        sla_due_at: ticket.sla_due_at,
    };

    match action {
        DispositionAction::Forward => {
            let target = target.ok_or_else(|| {
                DeskError::validation("target_user_id is required to forward a ticket")
            })?;
            ensure_active_handler(&target)?;
            if ticket.assignee_id == Some(target.id) {
                return Err(DeskError::conflict("Ticket is already assigned to that handler"));
            }
            plan.to_user_id = Some(target.id);
            plan.status = moved_status;
        }
        DispositionAction::Escalate => {
            let next = ticket.priority.next().ok_or_else(|| {
                DeskError::conflict("Ticket is already at urgent priority")
            })?;
            let new_priority = match requested_priority {
                Some(p) if p > ticket.priority => p,
                Some(p) => {
                    return Err(DeskError::validation(format!(
                        "Escalation must raise priority above {} (got {})",
                        ticket.priority, p
                    )))
                }
                None => next,
            };
            plan.new_priority = new_priority;
            plan.sla_due_at = resolution_due(sla, new_priority, ticket.created_at);

            match target {
                Some(target) => {
                    ensure_active_handler(&target)?;
                    plan.to_user_id = Some(target.id);
                    plan.status = moved_status;
                }
                None => {
                    plan.to_user_id = None;
                    plan.status = TicketStatus::Open;
                }
            }
        }
        DispositionAction::Return => {
            let target = target.ok_or_else(|| {
                DeskError::conflict("There is no previous handler to return this ticket to")
            })?;
            if !(target.role.is_handler() && target.is_active) {
                return Err(DeskError::conflict(
                    "The previous handler is no longer active",
                ));
            }
            if ticket.assignee_id == Some(target.id) {
                return Err(DeskError::conflict("Ticket is already with that handler"));
            }
            plan.to_user_id = Some(target.id);
            plan.status = moved_status;
        }
    }

    Ok(plan)
}

/// Who handed the ticket to `assignee` most recently, taken from its history.
pub fn return_target(history: &[TicketDisposition], assignee: Uuid) -> Option<Uuid> {
    history
        .iter()
        .filter(|d| d.to_user_id == Some(assignee))
        .max_by_key(|d| d.created_at)
        .and_then(|d| d.from_user_id)
        .filter(|id| *id != assignee)
}

/// Who handed the ticket to its current assignee, if anyone did.
pub fn find_return_target(conn: &mut DbConn, ticket: &Ticket) -> DeskResult<Option<Uuid>> {
    let Some(assignee) = ticket.assignee_id else {
        return Ok(None);
    };
    let history: Vec<TicketDisposition> = ticket_dispositions::table
        .filter(ticket_dispositions::ticket_id.eq(ticket.id))
        .filter(ticket_dispositions::to_user_id.eq(assignee))
        .load(conn)?;
    Ok(return_target(&history, assignee))
}

#[derive(Debug, Serialize)]
pub struct DispositionResponse {
    pub ticket: Ticket,
    pub disposition: TicketDisposition,
}

pub async fn handle_dispose_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DispositionRequest>,
) -> Result<Json<DispositionResponse>, DeskError> {
    user.require(Permission::HandleTickets)?;
    if req.action == DispositionAction::Forward && req.target_user_id.is_none() {
        return Err(DeskError::validation(
            "target_user_id is required to forward a ticket",
        ));
    }

    let sla = state.config.sla.clone();
    let note = normalize_optional(req.note);

    let response = with_conn(&state.conn, move |conn| {
        let (ticket, disposition) = conn.transaction::<_, DeskError, _>(|conn| {
            let ticket = load_ticket(conn, id)?;

            let target_id = match req.action {
                DispositionAction::Return => find_return_target(conn, &ticket)?,
                _ => req.target_user_id,
            };
            let target = match target_id {
                Some(target_id) => Some(
                    users::table
                        .find(target_id)
                        .first::<User>(conn)
                        .optional()?
                        .map(|u| Handler::from(&u))
                        .ok_or_else(|| DeskError::validation("Target user does not exist"))?,
                ),
                None => None,
            };

            let plan = plan_disposition(&user, &ticket, req.action, req.priority, target, &sla)?;
            let now = Utc::now();

            let updated: Ticket = diesel::update(tickets::table.find(ticket.id))
                .set((
                    tickets::assignee_id.eq(plan.to_user_id),
                    tickets::status.eq(plan.status),
                    tickets::priority.eq(plan.new_priority),
                    tickets::sla_due_at.eq(plan.sla_due_at),
                    tickets::sla_breach_notified.eq(ticket.sla_breach_notified && plan.sla_due_at <= now),
                    tickets::updated_at.eq(now),
                ))
                .get_result(conn)?;

            let disposition = TicketDisposition {
                id: Uuid::new_v4(),
                ticket_id: ticket.id,
                action: plan.action,
                from_user_id: plan.from_user_id,
                to_user_id: plan.to_user_id,
                actor_id: user.user_id,
                previous_priority: plan.previous_priority,
                new_priority: plan.new_priority,
                note: note.clone(),
                created_at: now,
            };
            diesel::insert_into(ticket_dispositions::table)
                .values(&disposition)
                .execute(conn)?;

            let to = recipients(
                [
                    disposition.to_user_id,
                    disposition.from_user_id,
                    Some(updated.creator_id),
                ],
                user.user_id,
            );
            let body = match &disposition.note {
                Some(note) => format!("{} by {}: {}", disposition.action, user.full_name, note),
                None => format!("{} by {}", disposition.action, user.full_name),
            };
            notify_ticket(
                conn,
                &to,
                NotificationKind::Disposition,
                &updated,
                "Ticket disposition",
                &body,
            );

            Ok((updated, disposition))
        })?;

        info!(
            "Ticket {} {} by {} ({:?} -> {:?})",
            ticket.ticket_number,
            disposition.action,
            user.user_id,
            disposition.from_user_id,
            disposition.to_user_id
        );
        Ok(DispositionResponse {
            ticket,
            disposition,
        })
    })
    .await?;

    Ok(Json(response))
}

pub async fn handle_list_dispositions(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TicketDisposition>>, DeskError> {
    let rows = with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, id)?;
        ensure_can_view(&user, &ticket)?;
        Ok(ticket_dispositions::table
            .filter(ticket_dispositions::ticket_id.eq(id))
            .order(ticket_dispositions::created_at.asc())
            .load::<TicketDisposition>(conn)?)
    })
    .await?;

    Ok(Json(rows))
}
