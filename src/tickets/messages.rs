use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::enums::{NotificationKind, TicketStatus};
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{Ticket, TicketMessage};
use crate::core::shared::schema::{ticket_messages, tickets};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, DbConn};
use crate::notifications::{notify_ticket, recipients};
use crate::security::auth_api::{AuthenticatedUser, Permission};
use crate::tickets::access::{ensure_can_post_message, ensure_can_view, is_creator};
use crate::tickets::handlers::load_ticket;

pub const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
    pub is_internal: Option<bool>,
}

/// Ticket fields touched as a side effect of a new message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MessageEffects {
    pub first_response_at: Option<DateTime<Utc>>,
    pub status: Option<TicketStatus>,
}

impl MessageEffects {
    pub fn is_empty(&self) -> bool {
        self.first_response_at.is_none() && self.status.is_none()
    }
}

pub fn message_effects(
    user: &AuthenticatedUser,
    ticket: &Ticket,
    is_internal: bool,
    now: DateTime<Utc>,
) -> MessageEffects {
    let mut effects = MessageEffects::default();
    if is_internal {
        return effects;
    }
    if user.is_handler() && !is_creator(user, ticket) && ticket.first_response_at.is_none() {
        effects.first_response_at = Some(now);
    }
    if is_creator(user, ticket) && ticket.status == TicketStatus::Pending {
        effects.status = Some(TicketStatus::InProgress);
    }
    effects
}

pub fn validate_body(body: &str) -> DeskResult<String> {
    let body = body.trim();
    if body.is_empty() {
        return Err(DeskError::validation("Message body is required"));
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(DeskError::validation(format!(
            "Message body cannot exceed {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(body.to_string())
}

pub fn load_visible_messages(
    conn: &mut DbConn,
    user: &AuthenticatedUser,
    ticket_id: Uuid,
) -> DeskResult<Vec<TicketMessage>> {
    let mut q = ticket_messages::table
        .filter(ticket_messages::ticket_id.eq(ticket_id))
        .into_boxed();
    if !user.is_handler() {
        q = q.filter(ticket_messages::is_internal.eq(false));
    }
    Ok(q.order(ticket_messages::created_at.asc()).load(conn)?)
}

pub async fn handle_post_message(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<TicketMessage>), DeskError> {
    let body = validate_body(&req.body)?;
    let is_internal = req.is_internal.unwrap_or(false);
    if is_internal {
        user.require(Permission::PostInternalNotes)?;
    }

    let message = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, DeskError, _>(|conn| {
            let ticket = load_ticket(conn, id)?;
            ensure_can_post_message(&user, &ticket, is_internal)?;

            let now = Utc::now();
            let message = TicketMessage {
                id: Uuid::new_v4(),
                ticket_id: ticket.id,
                author_id: user.user_id,
                body,
                is_internal,
                created_at: now,
            };
            diesel::insert_into(ticket_messages::table)
                .values(&message)
                .execute(conn)?;

            let effects = message_effects(&user, &ticket, is_internal, now);
            let ticket: Ticket = diesel::update(tickets::table.find(ticket.id))
                .set((
                    tickets::first_response_at.eq(effects.first_response_at.or(ticket.first_response_at)),
                    tickets::status.eq(effects.status.unwrap_or(ticket.status)),
                    tickets::updated_at.eq(now),
                ))
                .get_result(conn)?;

            let to = if message.is_internal {
                recipients([ticket.assignee_id], user.user_id)
            } else {
                recipients([Some(ticket.creator_id), ticket.assignee_id], user.user_id)
            };
            let title = if message.is_internal {
                "New internal note"
            } else {
                "New reply"
            };
            notify_ticket(
                conn,
                &to,
                NotificationKind::NewMessage,
                &ticket,
                title,
                &format!("{}: {}", user.full_name, preview(&message.body)),
            );
            Ok(message)
        })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn handle_list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TicketMessage>>, DeskError> {
    let rows = with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, id)?;
        ensure_can_view(&user, &ticket)?;
        load_visible_messages(conn, &user, ticket.id)
    })
    .await?;

    Ok(Json(rows))
}

fn preview(body: &str) -> String {
    const LEN: usize = 120;
    if body.chars().count() <= LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(LEN).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::UserRole;
    use crate::core::shared::test_utils::{test_ticket, test_user};

    #[test]
    fn test_first_public_handler_reply_sets_first_response() {
        let now = Utc::now();
        let student = test_user(UserRole::Student);
        let staff = test_user(UserRole::Staff);
        let ticket = test_ticket(student.user_id, Some(staff.user_id));

        let effects = message_effects(&staff, &ticket, false, now);
        assert_eq!(effects.first_response_at, Some(now));
        assert_eq!(effects.status, None);

        assert!(message_effects(&staff, &ticket, true, now).is_empty());
        assert!(message_effects(&student, &ticket, false, now).is_empty());
    }

    #[test]
    fn test_first_response_is_kept() {
        let now = Utc::now();
        let staff = test_user(UserRole::Staff);
        let mut ticket = test_ticket(uuid::Uuid::new_v4(), Some(staff.user_id));
        ticket.first_response_at = Some(now - chrono::Duration::hours(1));
        assert!(message_effects(&staff, &ticket, false, now).is_empty());
    }

    #[test]
    fn test_requester_reply_reactivates_pending() {
        let now = Utc::now();
        let student = test_user(UserRole::Student);
        let mut ticket = test_ticket(student.user_id, None);
        ticket.status = TicketStatus::Pending;

        let effects = message_effects(&student, &ticket, false, now);
        assert_eq!(effects.status, Some(TicketStatus::InProgress));
    }

    #[test]
    fn test_body_validation() {
        assert!(validate_body("   ").is_err());
        assert!(validate_body(&"a".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
        assert_eq!(validate_body("  thanks ").unwrap(), "thanks");
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(300);
        assert_eq!(preview(&long).chars().count(), 123);
    }
}
