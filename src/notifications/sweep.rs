use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{error, info};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use uuid::Uuid;

use crate::core::shared::enums::{NotificationKind, TicketStatus};
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::Ticket;
use crate::core::shared::schema::tickets;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{with_conn, DbConn};
use crate::notifications::{active_admin_ids, notify_ticket, recipients};

/// Periodically warns handlers about tickets that passed their SLA deadline.
pub struct SlaSweepService {
    state: Arc<AppState>,
}

impl SlaSweepService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn spawn(self) {
        let minutes = self.state.config.notifications.sla_sweep_interval_minutes.max(1);
        info!("SLA sweep started, every {} minute(s)", minutes);

        let mut ticker = interval(Duration::from_secs(minutes.saturating_mul(60)));
        loop {
            ticker.tick().await;
            let now = Utc::now();
            match with_conn(&self.state.conn, move |conn| sweep_once(conn, now)).await {
                Ok(0) => {}
                Ok(count) => info!("SLA sweep flagged {} overdue ticket(s)", count),
                Err(e) => error!("SLA sweep failed: {}", e),
            }
        }
    }
}

/// The assignee if there is one, otherwise every active admin.
pub fn breach_recipients(ticket: &Ticket, admins: &[Uuid]) -> Vec<Uuid> {
    match ticket.assignee_id {
        Some(assignee) => vec![assignee],
        None => recipients(admins.iter().copied().map(Some), Uuid::nil()),
    }
}

/// Notify once per overdue ticket and mark it. Returns the number of tickets flagged.
pub fn sweep_once(conn: &mut DbConn, now: DateTime<Utc>) -> DeskResult<usize> {
    let overdue: Vec<Ticket> = tickets::table
        .filter(tickets::deleted_at.is_null())
        .filter(tickets::status.eq_any(TicketStatus::ACTIVE.to_vec()))
        .filter(tickets::sla_due_at.lt(now))
        .filter(tickets::sla_breach_notified.eq(false))
        .order(tickets::sla_due_at.asc())
        .load(conn)?;

    if overdue.is_empty() {
        return Ok(0);
    }

    let admins = active_admin_ids(conn);
    let mut flagged = 0;
    for ticket in &overdue {
        let to = breach_recipients(ticket, &admins);
        let body = format!(
            "\"{}\" passed its {} SLA deadline at {}",
            ticket.subject,
            ticket.priority,
            ticket.sla_due_at.format("%Y-%m-%d %H:%M UTC")
        );
        conn.transaction::<_, DeskError, _>(|conn| {
            notify_ticket(conn, &to, NotificationKind::SlaBreached, ticket, "SLA breached", &body);
            diesel::update(tickets::table.find(ticket.id))
                .set(tickets::sla_breach_notified.eq(true))
                .execute(conn)?;
            Ok(())
        })?;
        flagged += 1;
    }

    Ok(flagged)
}
