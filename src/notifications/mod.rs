//! In-app notifications.
//!
//! Mutations that concern other people call [`notify`] inside their own
//! transaction, so notifications commit together with the change. Fan-out
//! is one batched insert per event in a savepoint: a failure there rolls
//! back only the notifications and is logged, never surfaced to the caller.

#[cfg(feature = "sla-sweep")]
pub mod sweep;

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::enums::{NotificationKind, UserRole};
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{Notification, Ticket};
use crate::core::shared::schema::{notifications, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, DbConn};
use crate::security::auth_api::AuthenticatedUser;

#[cfg(feature = "sla-sweep")]
pub use sweep::SlaSweepService;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

/// Distinct recipients in first-seen order, without the actor or empty slots.
pub fn recipients<I>(candidates: I, actor_id: Uuid) -> Vec<Uuid>
where
    I: IntoIterator<Item = Option<Uuid>>,
{
    let mut out: Vec<Uuid> = Vec::new();
    for id in candidates.into_iter().flatten() {
        if id != actor_id && !id.is_nil() && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Insert one notification per recipient. Returns how many rows were written.
///
/// Runs in a savepoint when called inside a transaction.
pub fn notify(
    conn: &mut DbConn,
    recipients: &[Uuid],
    kind: NotificationKind,
    ticket_id: Option<Uuid>,
    title: &str,
    body: &str,
) -> usize {
    if recipients.is_empty() {
        return 0;
    }

    let now = Utc::now();
    let rows: Vec<Notification> = recipients
        .iter()
        .map(|user_id| Notification {
            id: Uuid::new_v4(),
            user_id: *user_id,
            ticket_id,
            kind,
            title: title.to_string(),
            body: body.to_string(),
            is_read: false,
            created_at: now,
            read_at: None,
        })
        .collect();

    match conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::insert_into(notifications::table)
            .values(&rows)
            .execute(conn)
    }) {
        Ok(written) => written,
        Err(e) => {
            error!(
                "Failed to store {} notification(s) for ticket {:?}: {}",
                kind, ticket_id, e
            );
            0
        }
    }
}

/// Notify about a ticket, prefixing the title with its number.
pub fn notify_ticket(
    conn: &mut DbConn,
    recipients: &[Uuid],
    kind: NotificationKind,
    ticket: &Ticket,
    title: &str,
    body: &str,
) -> usize {
    let title = format!("[{}] {}", ticket.ticket_number, title);
    notify(conn, recipients, kind, Some(ticket.id), &title, body)
}

pub fn active_admin_ids(conn: &mut DbConn) -> Vec<Uuid> {
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        users::table
            .filter(users::role.eq(UserRole::Admin))
            .filter(users::is_active.eq(true))
            .select(users::id)
            .load(conn)
    })
    .unwrap_or_else(|e| {
        warn!("Could not load admin recipients: {}", e);
        Vec::new()
    })
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: usize,
}

pub fn count_unread(conn: &mut DbConn, user_id: Uuid) -> DeskResult<i64> {
    Ok(notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(conn)?)
}

pub async fn handle_list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, DeskError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let unread_only = query.unread_only.unwrap_or(false);

    let rows = with_conn(&state.conn, move |conn| {
        let mut q = notifications::table
            .filter(notifications::user_id.eq(user.user_id))
            .into_boxed();
        if unread_only {
            q = q.filter(notifications::is_read.eq(false));
        }
        Ok(q
            .order(notifications::created_at.desc())
            .limit(limit)
            .offset(offset)
            .load::<Notification>(conn)?)
    })
    .await?;

    Ok(Json(rows))
}

pub async fn handle_unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCount>, DeskError> {
    let unread = with_conn(&state.conn, move |conn| count_unread(conn, user.user_id)).await?;
    Ok(Json(UnreadCount { unread }))
}

pub async fn handle_mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, DeskError> {
    let notification = with_conn(&state.conn, move |conn| {
        let existing: Notification = notifications::table
            .find(id)
            .filter(notifications::user_id.eq(user.user_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| DeskError::not_found("Notification"))?;

        if existing.is_read {
            return Ok(existing);
        }

        Ok(diesel::update(notifications::table.find(id))
            .set((
                notifications::is_read.eq(true),
                notifications::read_at.eq(Some(Utc::now())),
            ))
            .get_result::<Notification>(conn)?)
    })
    .await?;

    Ok(Json(notification))
}

pub async fn handle_mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<MarkedRead>, DeskError> {
    let updated = with_conn(&state.conn, move |conn| {
        Ok(diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user.user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::read_at.eq(Some(Utc::now())),
        ))
        .execute(conn)?)
    })
    .await?;

    Ok(Json(MarkedRead { updated }))
}

pub fn configure_notifications_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(handle_list_notifications))
        .route("/api/notifications/unread-count", get(handle_unread_count))
        .route("/api/notifications/read-all", put(handle_mark_all_read))
        .route("/api/notifications/:id/read", put(handle_mark_read))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipients_dedup_and_actor_exclusion() {
        let actor = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let assignee = Uuid::new_v4();

        let out = recipients(
            [Some(creator), Some(assignee), Some(actor), Some(creator), None],
            actor,
        );
        assert_eq!(out, vec![creator, assignee]);
    }

    #[test]
    fn test_recipients_when_actor_is_everyone() {
        let actor = Uuid::new_v4();
        assert!(recipients([Some(actor), Some(actor)], actor).is_empty());
    }

    #[test]
    fn test_recipients_skip_nil() {
        let actor = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(recipients([Some(Uuid::nil()), Some(other)], actor), vec![other]);
    }
}
