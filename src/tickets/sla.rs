use chrono::{DateTime, Duration, Utc};

use crate::core::config::SlaConfig;
use crate::core::shared::enums::TicketPriority;
use crate::core::shared::models::Ticket;

/// Resolution deadline, always measured from ticket creation.
pub fn resolution_due(
    sla: &SlaConfig,
    priority: TicketPriority,
    created_at: DateTime<Utc>,
) -> DateTime<Utc> {
    created_at + Duration::hours(sla.target(priority).resolution_hours)
}

pub fn first_response_due(
    sla: &SlaConfig,
    priority: TicketPriority,
    created_at: DateTime<Utc>,
) -> DateTime<Utc> {
    created_at + Duration::hours(sla.target(priority).first_response_hours)
}

/// Whether the ticket was (or, if still open, is being) resolved on time.
pub fn met_resolution_target(ticket: &Ticket, now: DateTime<Utc>) -> bool {
    let finished = ticket.resolved_at.or(ticket.closed_at).unwrap_or(now);
    finished <= ticket.sla_due_at
}

/// A ticket finished without any reply counts its resolution as the response.
pub fn first_response_breached(sla: &SlaConfig, ticket: &Ticket, now: DateTime<Utc>) -> bool {
    let due = first_response_due(sla, ticket.priority, ticket.created_at);
    let answered = ticket.first_response_at.or(ticket.resolved_at).unwrap_or(now);
    answered > due
}

pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}
