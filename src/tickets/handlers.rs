use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::SlaConfig;
use crate::core::shared::enums::{NotificationKind, TicketPriority, TicketStatus, UserRole};
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{
    Attachment, Category, Subcategory, Ticket, TicketDisposition, TicketMessage, User, UserSummary,
};
use crate::core::shared::schema::{
    attachments, categories, subcategories, ticket_dispositions, tickets, users,
};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{format_ticket_number, normalize_optional, with_conn, DbConn};
use crate::notifications::{active_admin_ids, notify_ticket, recipients};
use crate::security::auth_api::{AuthenticatedUser, Permission};
use crate::tickets::access::{
    self, apply_status, ensure_can_rate, ensure_can_view, ensure_status_change, plan_assignment,
    AssignmentOutcome,
};
use crate::tickets::messages::load_visible_messages;
use crate::tickets::sla::resolution_due;

pub const SUBJECT_MIN_CHARS: usize = 3;
pub const SUBJECT_MAX_CHARS: usize = 200;
const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TicketStatus,
    pub resolution_note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolutionRequest {
    pub resolution_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTicketRequest {
    pub assignee_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsQuery {
    pub scope: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub search: Option<String>,
    pub overdue: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Which slice of tickets a handler is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Own,
    Assigned,
    Queue,
    AssignedAndQueue,
    All,
}

impl ListScope {
    pub fn resolve(user: &AuthenticatedUser, requested: Option<&str>) -> DeskResult<Self> {
        if user.is_requester() {
            return Ok(Self::Own);
        }
        match requested.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("assigned") | Some("mine") => Ok(Self::Assigned),
            Some("queue") | Some("unassigned") => Ok(Self::Queue),
            Some("all") | None if user.is_admin() => Ok(Self::All),
            Some("all") | None => Ok(Self::AssignedAndQueue),
            Some(other) => Err(DeskError::validation(format!("Unknown scope: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketFilter {
    pub scope: ListScope,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub category_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub search: Option<String>,
    pub overdue: bool,
    pub limit: i64,
    pub offset: i64,
}

impl TicketFilter {
    pub fn from_query(user: &AuthenticatedUser, query: ListTicketsQuery) -> DeskResult<Self> {
        let status = normalize_optional(query.status)
            .map(|s| TicketStatus::from_str(&s))
            .transpose()
            .map_err(DeskError::Validation)?;
        let priority = normalize_optional(query.priority)
            .map(|s| TicketPriority::from_str(&s))
            .transpose()
            .map_err(DeskError::Validation)?;

        Ok(Self {
            scope: ListScope::resolve(user, query.scope.as_deref())?,
            status,
            priority,
            category_id: query.category_id,
            assignee_id: query.assignee_id,
            search: normalize_optional(query.search),
            overdue: query.overdue.unwrap_or(false),
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: query.offset.unwrap_or(0).max(0),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTicketInput {
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
}

pub fn validate_subject(subject: &str) -> DeskResult<String> {
    let subject = subject.trim();
    let len = subject.chars().count();
    if !(SUBJECT_MIN_CHARS..=SUBJECT_MAX_CHARS).contains(&len) {
        return Err(DeskError::validation(format!(
            "Subject must be between {} and {} characters",
            SUBJECT_MIN_CHARS, SUBJECT_MAX_CHARS
        )));
    }
    Ok(subject.to_string())
}

pub fn validate_description(description: &str) -> DeskResult<String> {
    let description = description.trim();
    if description.is_empty() {
        return Err(DeskError::validation("Description is required"));
    }
    Ok(description.to_string())
}

pub fn validate_new_ticket(req: &CreateTicketRequest) -> DeskResult<ValidTicketInput> {
    Ok(ValidTicketInput {
        subject: validate_subject(&req.subject)?,
        description: validate_description(&req.description)?,
        priority: req.priority.unwrap_or_default(),
    })
}

#[derive(Debug, Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub is_overdue: bool,
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
    pub creator: Option<UserSummary>,
    pub assignee: Option<UserSummary>,
    pub messages: Vec<TicketMessage>,
    pub dispositions: Vec<TicketDisposition>,
    pub attachments: Vec<Attachment>,
}

pub fn load_ticket(conn: &mut DbConn, id: Uuid) -> DeskResult<Ticket> {
    tickets::table
        .find(id)
        .filter(tickets::deleted_at.is_null())
        .first::<Ticket>(conn)
        .optional()?
        .ok_or_else(|| DeskError::not_found("Ticket"))
}

/// Category and optional subcategory, both active and consistent.
pub fn load_classification(
    conn: &mut DbConn,
    category_id: Uuid,
    subcategory_id: Option<Uuid>,
) -> DeskResult<(Category, Option<Subcategory>)> {
    let category: Category = categories::table
        .find(category_id)
        .filter(categories::is_active.eq(true))
        .first(conn)
        .optional()?
        .ok_or_else(|| DeskError::validation("Category does not exist or is inactive"))?;

    let subcategory = match subcategory_id {
        Some(sub_id) => {
            let sub: Subcategory = subcategories::table
                .find(sub_id)
                .filter(subcategories::is_active.eq(true))
                .first(conn)
                .optional()?
                .ok_or_else(|| DeskError::validation("Subcategory does not exist or is inactive"))?;
            if sub.category_id != category.id {
                return Err(DeskError::validation(
                    "Subcategory does not belong to the selected category",
                ));
            }
            Some(sub)
        }
        None => None,
    };

    Ok((category, subcategory))
}

fn load_active_handler(conn: &mut DbConn, id: Uuid) -> DeskResult<Option<User>> {
    Ok(users::table
        .find(id)
        .filter(users::is_active.eq(true))
        .filter(users::role.eq_any(vec![UserRole::Staff, UserRole::Admin]))
        .first::<User>(conn)
        .optional()?)
}

fn next_ticket_number(conn: &mut DbConn) -> DeskResult<String> {
    let count: i64 = tickets::table.count().get_result(conn)?;
    Ok(format_ticket_number(count + 1))
}

pub fn build_ticket(
    input: ValidTicketInput,
    category: &Category,
    subcategory: Option<&Subcategory>,
    creator_id: Uuid,
    assignee_id: Option<Uuid>,
    ticket_number: String,
    sla: &SlaConfig,
) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: Uuid::new_v4(),
        ticket_number,
        subject: input.subject,
        description: input.description,
        status: TicketStatus::Open,
        priority: input.priority,
        category_id: category.id,
        subcategory_id: subcategory.map(|s| s.id),
        creator_id,
        assignee_id,
        sla_due_at: resolution_due(sla, input.priority, now),
        first_response_at: None,
        resolved_at: None,
        closed_at: None,
        resolution_note: None,
        satisfaction_rating: None,
        sla_breach_notified: false,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub async fn handle_create_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), DeskError> {
    user.require(Permission::SubmitTickets)?;
    let input = validate_new_ticket(&req)?;
    let sla = state.config.sla.clone();

    let ticket = with_conn(&state.conn, move |conn| {
        let ticket = conn.transaction::<_, DeskError, _>(|conn| {
            let (category, subcategory) =
                load_classification(conn, req.category_id, req.subcategory_id)?;

            let assignee_id = match category.default_assignee_id {
                Some(id) => load_active_handler(conn, id)?.map(|u| u.id),
                None => None,
            };

            let number = next_ticket_number(conn)?;
            let ticket = build_ticket(
                input,
                &category,
                subcategory.as_ref(),
                user.user_id,
                assignee_id,
                number,
                &sla,
            );
            diesel::insert_into(tickets::table)
                .values(&ticket)
                .execute(conn)?;

            if let Some(assignee) = ticket.assignee_id {
                let to = recipients([Some(assignee)], user.user_id);
                notify_ticket(
                    conn,
                    &to,
                    NotificationKind::TicketAssigned,
                    &ticket,
                    "New ticket assigned to you",
                    &ticket.subject,
                );
            }
            let admins = active_admin_ids(conn);
            let to: Vec<Uuid> = recipients(admins.into_iter().map(Some), user.user_id)
                .into_iter()
                .filter(|id| Some(*id) != ticket.assignee_id)
                .collect();
            notify_ticket(
                conn,
                &to,
                NotificationKind::TicketCreated,
                &ticket,
                "New ticket submitted",
                &format!("{} submitted \"{}\"", user.full_name, ticket.subject),
            );
            Ok(ticket)
        })?;

        info!("Ticket {} created by {}", ticket.ticket_number, user.user_id);
        Ok(ticket)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub fn query_tickets(
    conn: &mut DbConn,
    user: &AuthenticatedUser,
    filter: &TicketFilter,
) -> DeskResult<Vec<Ticket>> {
    let mut q = tickets::table
        .filter(tickets::deleted_at.is_null())
        .into_boxed();

    q = match filter.scope {
        ListScope::Own => q.filter(tickets::creator_id.eq(user.user_id)),
        ListScope::Assigned => q.filter(tickets::assignee_id.eq(user.user_id)),
        ListScope::Queue => q.filter(tickets::assignee_id.is_null()),
        ListScope::AssignedAndQueue => q.filter(
            tickets::assignee_id
                .eq(user.user_id)
                .or(tickets::assignee_id.is_null()),
        ),
        ListScope::All => q,
    };

    if let Some(status) = filter.status {
        q = q.filter(tickets::status.eq(status));
    }
    if let Some(priority) = filter.priority {
        q = q.filter(tickets::priority.eq(priority));
    }
    if let Some(category_id) = filter.category_id {
        q = q.filter(tickets::category_id.eq(category_id));
    }
    if let Some(assignee_id) = filter.assignee_id {
        q = q.filter(tickets::assignee_id.eq(assignee_id));
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{search}%");
        q = q.filter(
            tickets::subject
                .ilike(pattern.clone())
                .or(tickets::description.ilike(pattern.clone()))
                .or(tickets::ticket_number.ilike(pattern)),
        );
    }
    if filter.overdue {
        q = q
            .filter(tickets::status.eq_any(TicketStatus::ACTIVE.to_vec()))
            .filter(tickets::sla_due_at.lt(Utc::now()));
    }

    Ok(q.order(tickets::created_at.desc())
        .limit(filter.limit)
        .offset(filter.offset)
        .load::<Ticket>(conn)?)
}

pub async fn handle_list_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<Ticket>>, DeskError> {
    let filter = TicketFilter::from_query(&user, query)?;
    let rows = with_conn(&state.conn, move |conn| query_tickets(conn, &user, &filter)).await?;
    Ok(Json(rows))
}

pub async fn handle_get_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, DeskError> {
    let detail = with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, id)?;
        ensure_can_view(&user, &ticket)?;

        let category: Option<Category> = categories::table
            .find(ticket.category_id)
            .first(conn)
            .optional()?;
        let subcategory: Option<Subcategory> = match ticket.subcategory_id {
            Some(sub_id) => subcategories::table.find(sub_id).first(conn).optional()?,
            None => None,
        };

        let people: Vec<UserSummary> = users::table
            .filter(users::id.eq_any(
                [Some(ticket.creator_id), ticket.assignee_id]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>(),
            ))
            .select(UserSummary::as_select())
            .load(conn)?;
        let creator = people.iter().find(|u| u.id == ticket.creator_id).cloned();
        let assignee = ticket
            .assignee_id
            .and_then(|a| people.iter().find(|u| u.id == a).cloned());

        let messages = load_visible_messages(conn, &user, ticket.id)?;
        let dispositions: Vec<TicketDisposition> = ticket_dispositions::table
            .filter(ticket_dispositions::ticket_id.eq(ticket.id))
            .order(ticket_dispositions::created_at.asc())
            .load(conn)?;
        let attachments =
            crate::tickets::attachments::load_visible_attachments(conn, &user, ticket.id)?;

        Ok(TicketDetail {
            is_overdue: ticket.is_overdue(Utc::now()),
            ticket,
            category,
            subcategory,
            creator,
            assignee,
            messages,
            dispositions,
            attachments,
        })
    })
    .await?;

    Ok(Json(detail))
}

pub async fn handle_update_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, DeskError> {
    if req.subject.is_none()
        && req.description.is_none()
        && req.category_id.is_none()
        && req.subcategory_id.is_none()
        && req.priority.is_none()
    {
        return Err(DeskError::validation("Nothing to update"));
    }
    let subject = req.subject.as_deref().map(validate_subject).transpose()?;
    let description = req
        .description
        .as_deref()
        .map(validate_description)
        .transpose()?;
    let sla = state.config.sla.clone();

    let ticket = with_conn(&state.conn, move |conn| {
        let mut ticket = load_ticket(conn, id)?;
        ensure_can_view(&user, &ticket)?;

        let content_editor = access::can_edit_content(&user, &ticket) || user.is_admin();
        let triager = access::can_triage(&user, &ticket);

        if (subject.is_some() || description.is_some()) && !content_editor {
            return Err(DeskError::Forbidden(
                "Subject and description can only change before the ticket is picked up"
                    .to_string(),
            ));
        }
        if req.priority.is_some() && !triager {
            return Err(DeskError::Forbidden(
                "Only the handling staff can change priority".to_string(),
            ));
        }
        if (req.category_id.is_some() || req.subcategory_id.is_some())
            && !(content_editor || triager)
        {
            return Err(DeskError::forbidden());
        }

        if let Some(subject) = subject {
            ticket.subject = subject;
        }
        if let Some(description) = description {
            ticket.description = description;
        }
        if req.category_id.is_some() || req.subcategory_id.is_some() {
            let category_id = req.category_id.unwrap_or(ticket.category_id);
            let subcategory_id = match (req.category_id, req.subcategory_id) {
                (_, Some(sub)) => Some(sub),
                (Some(cat), None) if cat != ticket.category_id => None,
                _ => ticket.subcategory_id,
            };
            let (category, subcategory) = load_classification(conn, category_id, subcategory_id)?;
            ticket.category_id = category.id;
            ticket.subcategory_id = subcategory.map(|s| s.id);
        }

        let now = Utc::now();
        if let Some(priority) = req.priority {
            if priority != ticket.priority {
                ticket.priority = priority;
                ticket.sla_due_at = resolution_due(&sla, priority, ticket.created_at);
                if ticket.sla_due_at > now {
                    ticket.sla_breach_notified = false;
                }
            }
        }
        ticket.updated_at = now;

        Ok(diesel::update(tickets::table.find(ticket.id))
            .set(&ticket)
            .get_result::<Ticket>(conn)?)
    })
    .await?;

    Ok(Json(ticket))
}

async fn change_status(
    state: Arc<AppState>,
    user: AuthenticatedUser,
    id: Uuid,
    next: TicketStatus,
    resolution_note: Option<String>,
) -> DeskResult<Ticket> {
    let note = normalize_optional(resolution_note);

    with_conn(&state.conn, move |conn| {
        let (ticket, previous) = conn.transaction::<_, DeskError, _>(|conn| {
            let mut ticket = load_ticket(conn, id)?;
            ensure_can_view(&user, &ticket)?;
            ensure_status_change(&user, &ticket, next)?;

            let previous = ticket.status;
            apply_status(&mut ticket, next, note, Utc::now());
            let ticket: Ticket = diesel::update(tickets::table.find(ticket.id))
                .set(&ticket)
                .get_result(conn)?;

            let to = recipients([Some(ticket.creator_id), ticket.assignee_id], user.user_id);
            notify_ticket(
                conn,
                &to,
                NotificationKind::StatusChanged,
                &ticket,
                "Status changed",
                &format!("{} changed the status from {} to {}", user.full_name, previous, next),
            );
            Ok((ticket, previous))
        })?;
        info!(
            "Ticket {} status {} -> {} by {}",
            ticket.ticket_number, previous, next, user.user_id
        );
        Ok(ticket)
    })
    .await
}

pub async fn handle_change_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Ticket>, DeskError> {
    let ticket = change_status(state, user, id, req.status, req.resolution_note).await?;
    Ok(Json(ticket))
}

pub async fn handle_resolve_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolutionRequest>>,
) -> Result<Json<Ticket>, DeskError> {
    let note = body.and_then(|Json(b)| b.resolution_note);
    let ticket = change_status(state, user, id, TicketStatus::Resolved, note).await?;
    Ok(Json(ticket))
}

pub async fn handle_close_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, DeskError> {
    let ticket = change_status(state, user, id, TicketStatus::Closed, None).await?;
    Ok(Json(ticket))
}

pub async fn handle_reopen_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, DeskError> {
    let ticket = change_status(state, user, id, TicketStatus::Open, None).await?;
    Ok(Json(ticket))
}

pub async fn handle_assign_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTicketRequest>,
) -> Result<Json<Ticket>, DeskError> {
    if !user.has_permission(Permission::AssignTickets) && !user.has_permission(Permission::ClaimTickets) {
        return Err(DeskError::forbidden());
    }

    let ticket = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, DeskError, _>(|conn| {
            let ticket = load_ticket(conn, id)?;
            let target: User = users::table
                .find(req.assignee_id)
                .first(conn)
                .optional()?
                .ok_or_else(|| DeskError::validation("Assignee does not exist"))?;

            let status = match plan_assignment(&user, &ticket, target.id, target.role, target.is_active)? {
                AssignmentOutcome::Unchanged => return Ok(ticket),
                AssignmentOutcome::Assigned { status } => status,
            };

            let previous = ticket.assignee_id;
            let ticket: Ticket = diesel::update(tickets::table.find(ticket.id))
                .set((
                    tickets::assignee_id.eq(Some(target.id)),
                    tickets::status.eq(status),
                    tickets::updated_at.eq(Utc::now()),
                ))
                .get_result(conn)?;

            let to = recipients([Some(target.id)], user.user_id);
            notify_ticket(
                conn,
                &to,
                NotificationKind::TicketAssigned,
                &ticket,
                "Ticket assigned to you",
                &format!("{} assigned \"{}\" to you", user.full_name, ticket.subject),
            );
            let to = recipients([previous, Some(ticket.creator_id)], user.user_id)
                .into_iter()
                .filter(|id| *id != target.id)
                .collect::<Vec<_>>();
            notify_ticket(
                conn,
                &to,
                NotificationKind::TicketAssigned,
                &ticket,
                "Ticket reassigned",
                &format!("Now handled by {}", target.full_name),
            );
            Ok(ticket)
        })
    })
    .await?;

    Ok(Json(ticket))
}

pub async fn handle_rate_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RatingRequest>,
) -> Result<Json<Ticket>, DeskError> {
    if !(1..=5).contains(&req.rating) {
        return Err(DeskError::validation("Rating must be between 1 and 5"));
    }

    let ticket = with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, id)?;
        ensure_can_view(&user, &ticket)?;
        ensure_can_rate(&user, &ticket, req.rating)?;

        Ok(diesel::update(tickets::table.find(ticket.id))
            .set((
                tickets::satisfaction_rating.eq(Some(req.rating)),
                tickets::updated_at.eq(Utc::now()),
            ))
            .get_result::<Ticket>(conn)?)
    })
    .await?;

    Ok(Json(ticket))
}

pub async fn handle_delete_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, DeskError> {
    with_conn(&state.conn, move |conn| {
        let ticket = load_ticket(conn, id)?;
        ensure_can_view(&user, &ticket)?;
        if !access::can_delete(&user, &ticket) {
            return Err(DeskError::Forbidden(
                "Only an administrator can delete a ticket that is already being handled"
                    .to_string(),
            ));
        }

        diesel::update(tickets::table.find(ticket.id))
            .set(tickets::deleted_at.eq(Some(Utc::now())))
            .execute(conn)?;
        info!("Ticket {} deleted by {}", ticket.ticket_number, user.user_id);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_list_overdue(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Ticket>>, DeskError> {
    user.require(Permission::ViewTicketQueue)?;

    let rows = with_conn(&state.conn, move |conn| {
        Ok(tickets::table
            .filter(tickets::deleted_at.is_null())
            .filter(tickets::status.eq_any(TicketStatus::ACTIVE.to_vec()))
            .filter(tickets::sla_due_at.lt(Utc::now()))
            .order(tickets::sla_due_at.asc())
            .load::<Ticket>(conn)?)
    })
    .await?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::test_user;

    fn request(subject: &str, description: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            subject: subject.to_string(),
            description: description.to_string(),
            category_id: Uuid::new_v4(),
            subcategory_id: None,
            priority: None,
        }
    }

    #[test]
    fn test_validate_new_ticket_defaults() {
        let input = validate_new_ticket(&request("  Wi-Fi down in lab 3 ", "No signal since 9am")).unwrap();
        assert_eq!(input.subject, "Wi-Fi down in lab 3");
        assert_eq!(input.priority, TicketPriority::Medium);
    }

    #[test]
    fn test_subject_length_bounds() {
        assert!(validate_new_ticket(&request("ab", "desc")).is_err());
        assert!(validate_new_ticket(&request("abc", "desc")).is_ok());
        assert!(validate_new_ticket(&request(&"x".repeat(200), "desc")).is_ok());
        assert!(validate_new_ticket(&request(&"x".repeat(201), "desc")).is_err());
    }

    #[test]
    fn test_description_required() {
        assert!(matches!(
            validate_new_ticket(&request("Printer jam", "   ")),
            Err(DeskError::Validation(_))
        ));
    }

    #[test]
    fn test_build_ticket_sets_sla_and_assignee() {
        let sla = SlaConfig::default();
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: "Network".to_string(),
            description: None,
            default_assignee_id: None,
            sort_order: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let creator = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let input = ValidTicketInput {
            subject: "VPN".to_string(),
            description: "Cannot connect".to_string(),
            priority: TicketPriority::High,
        };

        let ticket = build_ticket(
            input,
            &category,
            None,
            creator,
            Some(assignee),
            "TKT-000007".to_string(),
            &sla,
        );
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.assignee_id, Some(assignee));
        assert_eq!(ticket.ticket_number, "TKT-000007");
        assert_eq!(ticket.sla_due_at, ticket.created_at + chrono::Duration::hours(24));
    }

    #[test]
    fn test_scope_resolution() {
        let student = test_user(UserRole::Student);
        let staff = test_user(UserRole::Staff);
        let admin = test_user(UserRole::Admin);

        assert_eq!(ListScope::resolve(&student, Some("all")).unwrap(), ListScope::Own);
        assert_eq!(ListScope::resolve(&staff, None).unwrap(), ListScope::AssignedAndQueue);
        assert_eq!(ListScope::resolve(&staff, Some("queue")).unwrap(), ListScope::Queue);
        assert_eq!(ListScope::resolve(&admin, None).unwrap(), ListScope::All);
        assert_eq!(ListScope::resolve(&admin, Some("assigned")).unwrap(), ListScope::Assigned);
        assert!(ListScope::resolve(&admin, Some("everything")).is_err());
    }

    #[test]
    fn test_filter_parsing() {
        let staff = test_user(UserRole::Staff);
        let filter = TicketFilter::from_query(
            &staff,
            ListTicketsQuery {
                status: Some("in_progress".to_string()),
                priority: Some("urgent".to_string()),
                limit: Some(10_000),
                offset: Some(-5),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(filter.status, Some(TicketStatus::InProgress));
        assert_eq!(filter.priority, Some(TicketPriority::Urgent));
        assert_eq!(filter.limit, 200);
        assert_eq!(filter.offset, 0);

        let bad = TicketFilter::from_query(
            &staff,
            ListTicketsQuery {
                status: Some("lost".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(bad, Err(DeskError::Validation(_))));
    }
}
