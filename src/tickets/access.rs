//! Ticket-level authorization and state rules.
//!
//! Everything here is pure: handlers load the ticket, call one of these
//! checks, then write. Role-wide permissions live in `security::auth_api`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::shared::enums::{TicketStatus, UserRole};
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::Ticket;
use crate::security::auth_api::{AuthenticatedUser, Permission};

pub fn is_creator(user: &AuthenticatedUser, ticket: &Ticket) -> bool {
    ticket.creator_id == user.user_id
}

pub fn is_assignee(user: &AuthenticatedUser, ticket: &Ticket) -> bool {
    ticket.assignee_id == Some(user.user_id)
}

/// Requesters see their own tickets; handlers see every ticket.
pub fn can_view(user: &AuthenticatedUser, ticket: &Ticket) -> bool {
    user.is_handler() || is_creator(user, ticket)
}

pub fn ensure_can_view(user: &AuthenticatedUser, ticket: &Ticket) -> DeskResult<()> {
    if can_view(user, ticket) {
        Ok(())
    } else {
        // Hide the existence of other people's tickets.
        Err(DeskError::not_found("Ticket"))
    }
}

pub fn message_visible(user: &AuthenticatedUser, is_internal: bool) -> bool {
    !is_internal || user.is_handler()
}

/// Subject, description and category of a ticket nobody has picked up yet.
pub fn can_edit_content(user: &AuthenticatedUser, ticket: &Ticket) -> bool {
    is_creator(user, ticket) && ticket.status == TicketStatus::Open && ticket.assignee_id.is_none()
}

/// Priority and category while the ticket is still being worked.
pub fn can_triage(user: &AuthenticatedUser, ticket: &Ticket) -> bool {
    if ticket.status.is_terminal() {
        return false;
    }
    user.is_admin()
        || (user.has_permission(Permission::HandleTickets)
            && (ticket.assignee_id.is_none() || is_assignee(user, ticket)))
}

pub fn ensure_status_change(
    user: &AuthenticatedUser,
    ticket: &Ticket,
    next: TicketStatus,
) -> DeskResult<()> {
    if user.is_requester() {
        let allowed = is_creator(user, ticket)
            && ticket.status == TicketStatus::Resolved
            && matches!(next, TicketStatus::Closed | TicketStatus::Open);
        if !allowed {
            return Err(DeskError::Forbidden(
                "Requesters may only close or reopen their own resolved tickets".to_string(),
            ));
        }
    } else if !user.is_admin() && !is_assignee(user, ticket) {
        return Err(DeskError::Forbidden(
            "Only the assigned handler can change this ticket's status".to_string(),
        ));
    }

    if ticket.status == next {
        return Err(DeskError::conflict(format!("Ticket is already {}", next)));
    }
    if !ticket.status.can_transition_to(next) {
        return Err(DeskError::conflict(format!(
            "Cannot change status from {} to {}",
            ticket.status, next
        )));
    }
    if ticket.status == TicketStatus::Closed && !user.is_admin() {
        return Err(DeskError::Forbidden(
            "Only an administrator can reopen a closed ticket".to_string(),
        ));
    }
    Ok(())
}

/// Apply timestamps that go with a status change.
pub fn apply_status(
    ticket: &mut Ticket,
    next: TicketStatus,
    resolution_note: Option<String>,
    now: DateTime<Utc>,
) {
    match next {
        TicketStatus::Resolved => {
            ticket.resolved_at = Some(now);
            if resolution_note.is_some() {
                ticket.resolution_note = resolution_note;
            }
        }
        TicketStatus::Closed => {
            ticket.closed_at = Some(now);
            if ticket.resolved_at.is_none() {
                ticket.resolved_at = Some(now);
            }
            if resolution_note.is_some() {
                ticket.resolution_note = resolution_note;
            }
        }
        TicketStatus::Open if ticket.status.is_terminal() => {
            ticket.resolved_at = None;
            ticket.closed_at = None;
            ticket.satisfaction_rating = None;
        }
        _ => {}
    }
    ticket.status = next;
    ticket.updated_at = now;
}

/// Outcome of an assignment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOutcome {
    Unchanged,
    Assigned { status: TicketStatus },
}

/// `target` is the would-be assignee with its role and active flag.
pub fn plan_assignment(
    user: &AuthenticatedUser,
    ticket: &Ticket,
    target_id: Uuid,
    target_role: UserRole,
    target_active: bool,
) -> DeskResult<AssignmentOutcome> {
    if ticket.status.is_terminal() {
        return Err(DeskError::conflict(format!(
            "Cannot assign a {} ticket",
            ticket.status
        )));
    }

    if !user.is_admin() {
        let claiming = user.role == UserRole::Staff
            && target_id == user.user_id
            && ticket.assignee_id.is_none();
        if !claiming {
            return Err(DeskError::Forbidden(
                "Staff can only claim unassigned tickets for themselves".to_string(),
            ));
        }
    }

    if !target_role.is_handler() || !target_active {
        return Err(DeskError::validation(
            "Tickets can only be assigned to active staff or administrators",
        ));
    }

    if ticket.assignee_id == Some(target_id) {
        return Ok(AssignmentOutcome::Unchanged);
    }

    let status = if ticket.status == TicketStatus::Open {
        TicketStatus::InProgress
    } else {
        ticket.status
    };
    Ok(AssignmentOutcome::Assigned { status })
}

pub fn can_delete(user: &AuthenticatedUser, ticket: &Ticket) -> bool {
    user.has_permission(Permission::DeleteTickets) || can_edit_content(user, ticket)
}

pub fn ensure_can_rate(user: &AuthenticatedUser, ticket: &Ticket, rating: i32) -> DeskResult<()> {
    if !is_creator(user, ticket) {
        return Err(DeskError::Forbidden(
            "Only the ticket creator can rate it".to_string(),
        ));
    }
    if !(1..=5).contains(&rating) {
        return Err(DeskError::validation("Rating must be between 1 and 5"));
    }
    if !ticket.status.is_terminal() {
        return Err(DeskError::conflict(
            "Only resolved or closed tickets can be rated",
        ));
    }
    Ok(())
}

pub fn ensure_can_post_message(
    user: &AuthenticatedUser,
    ticket: &Ticket,
    is_internal: bool,
) -> DeskResult<()> {
    if !can_view(user, ticket) {
        return Err(DeskError::not_found("Ticket"));
    }
    if is_internal && !user.is_handler() {
        return Err(DeskError::Forbidden(
            "Only staff can post internal notes".to_string(),
        ));
    }
    if ticket.status == TicketStatus::Closed {
        return Err(DeskError::conflict("Ticket is closed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::test_utils::{test_ticket, test_user};

    #[test]
    fn test_requester_isolation() {
        let alice = test_user(UserRole::Student);
        let bob = test_user(UserRole::Lecturer);
        let ticket = test_ticket(alice.user_id, None);

        assert!(can_view(&alice, &ticket));
        assert!(!can_view(&bob, &ticket));
        assert!(matches!(
            ensure_can_view(&bob, &ticket),
            Err(DeskError::NotFound(_))
        ));
        assert!(can_view(&test_user(UserRole::Staff), &ticket));
        assert!(can_view(&test_user(UserRole::Admin), &ticket));
    }

    #[test]
    fn test_internal_messages_hidden_from_requesters() {
        assert!(!message_visible(&test_user(UserRole::Student), true));
        assert!(message_visible(&test_user(UserRole::Student), false));
        assert!(message_visible(&test_user(UserRole::Staff), true));
    }

    #[test]
    fn test_creator_edits_only_untouched_tickets() {
        let alice = test_user(UserRole::Student);
        let mut ticket = test_ticket(alice.user_id, None);
        assert!(can_edit_content(&alice, &ticket));
        assert!(can_delete(&alice, &ticket));

        ticket.assignee_id = Some(Uuid::new_v4());
        assert!(!can_edit_content(&alice, &ticket));
        assert!(!can_delete(&alice, &ticket));
        assert!(!can_delete(&test_user(UserRole::Staff), &ticket));
        assert!(can_delete(&test_user(UserRole::Admin), &ticket));
        assert!(!can_delete(&AuthenticatedUser::anonymous(), &ticket));
    }

    #[test]
    fn test_staff_triage_scope() {
        let staff = test_user(UserRole::Staff);
        let mut ticket = test_ticket(Uuid::new_v4(), None);
        assert!(can_triage(&staff, &ticket));
        assert!(!can_triage(&test_user(UserRole::Lecturer), &ticket));

        ticket.assignee_id = Some(Uuid::new_v4());
        assert!(!can_triage(&staff, &ticket));
        assert!(can_triage(&test_user(UserRole::Admin), &ticket));

        ticket.status = TicketStatus::Resolved;
        assert!(!can_triage(&test_user(UserRole::Admin), &ticket));
    }

    #[test]
    fn test_requester_status_changes() {
        let alice = test_user(UserRole::Student);
        let mut ticket = test_ticket(alice.user_id, Some(Uuid::new_v4()));

        assert!(ensure_status_change(&alice, &ticket, TicketStatus::Resolved).is_err());

        ticket.status = TicketStatus::Resolved;
        assert!(ensure_status_change(&alice, &ticket, TicketStatus::Closed).is_ok());
        assert!(ensure_status_change(&alice, &ticket, TicketStatus::Open).is_ok());

        let bob = test_user(UserRole::Student);
        assert!(matches!(
            ensure_status_change(&bob, &ticket, TicketStatus::Closed),
            Err(DeskError::Forbidden(_))
        ));
    }

    #[test]
    fn test_staff_status_changes_need_assignment() {
        let staff = test_user(UserRole::Staff);
        let mut ticket = test_ticket(Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(matches!(
            ensure_status_change(&staff, &ticket, TicketStatus::Pending),
            Err(DeskError::Forbidden(_))
        ));

        ticket.assignee_id = Some(staff.user_id);
        ticket.status = TicketStatus::InProgress;
        assert!(ensure_status_change(&staff, &ticket, TicketStatus::Pending).is_ok());
    }

    #[test]
    fn test_same_status_is_rejected() {
        let admin = test_user(UserRole::Admin);
        let ticket = test_ticket(Uuid::new_v4(), None);
        assert!(matches!(
            ensure_status_change(&admin, &ticket, TicketStatus::Open),
            Err(DeskError::Conflict(_))
        ));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let admin = test_user(UserRole::Admin);
        let mut ticket = test_ticket(Uuid::new_v4(), None);
        ticket.status = TicketStatus::Pending;
        assert!(matches!(
            ensure_status_change(&admin, &ticket, TicketStatus::Open),
            Err(DeskError::Conflict(_))
        ));
    }

    #[test]
    fn test_reopen_closed_is_admin_only() {
        let staff = test_user(UserRole::Staff);
        let mut ticket = test_ticket(Uuid::new_v4(), Some(staff.user_id));
        ticket.status = TicketStatus::Closed;

        assert!(matches!(
            ensure_status_change(&staff, &ticket, TicketStatus::Open),
            Err(DeskError::Forbidden(_))
        ));
        assert!(ensure_status_change(&test_user(UserRole::Admin), &ticket, TicketStatus::Open).is_ok());
    }

    #[test]
    fn test_apply_status_timestamps() {
        let now = Utc::now();
        let mut ticket = test_ticket(Uuid::new_v4(), None);

        apply_status(&mut ticket, TicketStatus::Resolved, Some("Password reset".into()), now);
        assert_eq!(ticket.resolved_at, Some(now));
        assert_eq!(ticket.resolution_note.as_deref(), Some("Password reset"));

        apply_status(&mut ticket, TicketStatus::Closed, None, now);
        assert_eq!(ticket.closed_at, Some(now));
        assert_eq!(ticket.resolution_note.as_deref(), Some("Password reset"));

        ticket.satisfaction_rating = Some(4);
        apply_status(&mut ticket, TicketStatus::Open, None, now);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.resolved_at.is_none());
        assert!(ticket.closed_at.is_none());
        assert!(ticket.satisfaction_rating.is_none());
    }

    #[test]
    fn test_admin_assignment() {
        let admin = test_user(UserRole::Admin);
        let ticket = test_ticket(Uuid::new_v4(), None);
        let staff_id = Uuid::new_v4();

        assert_eq!(
            plan_assignment(&admin, &ticket, staff_id, UserRole::Staff, true).unwrap(),
            AssignmentOutcome::Assigned {
                status: TicketStatus::InProgress
            }
        );
        assert!(matches!(
            plan_assignment(&admin, &ticket, staff_id, UserRole::Student, true),
            Err(DeskError::Validation(_))
        ));
        assert!(matches!(
            plan_assignment(&admin, &ticket, staff_id, UserRole::Staff, false),
            Err(DeskError::Validation(_))
        ));
    }

    #[test]
    fn test_staff_can_only_claim() {
        let staff = test_user(UserRole::Staff);
        let ticket = test_ticket(Uuid::new_v4(), None);

        assert!(plan_assignment(&staff, &ticket, staff.user_id, UserRole::Staff, true).is_ok());
        assert!(matches!(
            plan_assignment(&staff, &ticket, Uuid::new_v4(), UserRole::Staff, true),
            Err(DeskError::Forbidden(_))
        ));

        let taken = test_ticket(Uuid::new_v4(), Some(Uuid::new_v4()));
        assert!(plan_assignment(&staff, &taken, staff.user_id, UserRole::Staff, true).is_err());
    }

    #[test]
    fn test_same_assignee_is_noop() {
        let admin = test_user(UserRole::Admin);
        let staff_id = Uuid::new_v4();
        let mut ticket = test_ticket(Uuid::new_v4(), Some(staff_id));
        ticket.status = TicketStatus::InProgress;

        assert_eq!(
            plan_assignment(&admin, &ticket, staff_id, UserRole::Staff, true).unwrap(),
            AssignmentOutcome::Unchanged
        );
    }

    #[test]
    fn test_rating_rules() {
        let alice = test_user(UserRole::Student);
        let mut ticket = test_ticket(alice.user_id, None);
        assert!(matches!(
            ensure_can_rate(&alice, &ticket, 5),
            Err(DeskError::Conflict(_))
        ));

        ticket.status = TicketStatus::Resolved;
        assert!(ensure_can_rate(&alice, &ticket, 5).is_ok());
        assert!(matches!(
            ensure_can_rate(&alice, &ticket, 6),
            Err(DeskError::Validation(_))
        ));
        assert!(ensure_can_rate(&test_user(UserRole::Student), &ticket, 3).is_err());
    }

    #[test]
    fn test_message_posting_rules() {
        let alice = test_user(UserRole::Student);
        let mut ticket = test_ticket(alice.user_id, None);

        assert!(ensure_can_post_message(&alice, &ticket, false).is_ok());
        assert!(matches!(
            ensure_can_post_message(&alice, &ticket, true),
            Err(DeskError::Forbidden(_))
        ));
        assert!(ensure_can_post_message(&test_user(UserRole::Staff), &ticket, true).is_ok());

        ticket.status = TicketStatus::Closed;
        assert!(matches!(
            ensure_can_post_message(&alice, &ticket, false),
            Err(DeskError::Conflict(_))
        ));
    }
}
