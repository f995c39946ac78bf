//! Aggregations over loaded ticket rows. Nothing here touches the database.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::core::config::SlaConfig;
use crate::core::shared::enums::{TicketPriority, TicketStatus};
use crate::core::shared::models::{Category, Ticket, UserSummary};
use crate::dashboards::error::DashboardsError;
use crate::dashboards::types::{
    CategoryCount, HandlerWorkload, PriorityCount, StatusCount, TicketReport,
};
use crate::tickets::sla::{first_response_breached, hours_between, met_resolution_target};

pub const DEFAULT_REPORT_DAYS: i64 = 30;

pub fn count_by_status(tickets: &[Ticket]) -> Vec<StatusCount> {
    TicketStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: tickets.iter().filter(|t| t.status == *status).count() as i64,
        })
        .collect()
}

pub fn count_by_priority(tickets: &[Ticket]) -> Vec<PriorityCount> {
    TicketPriority::ALL
        .iter()
        .map(|priority| PriorityCount {
            priority: *priority,
            count: tickets.iter().filter(|t| t.priority == *priority).count() as i64,
        })
        .collect()
}

/// Categories with at least one ticket, busiest first.
pub fn count_by_category(tickets: &[Ticket], categories: &[Category]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = categories
        .iter()
        .map(|c| CategoryCount {
            category_id: c.id,
            name: c.name.clone(),
            count: tickets.iter().filter(|t| t.category_id == c.id).count() as i64,
        })
        .filter(|c| c.count > 0)
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(round2(sum / n as f64))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn average_resolution_hours(tickets: &[Ticket]) -> Option<f64> {
    average(
        tickets
            .iter()
            .filter_map(|t| t.resolved_at.map(|at| hours_between(t.created_at, at))),
    )
}

pub fn average_first_response_hours(tickets: &[Ticket]) -> Option<f64> {
    average(
        tickets
            .iter()
            .filter_map(|t| t.first_response_at.map(|at| hours_between(t.created_at, at))),
    )
}

/// Share of finished tickets that met their resolution deadline.
pub fn sla_met_percentage(tickets: &[Ticket], now: DateTime<Utc>) -> Option<f64> {
    let finished: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| t.resolved_at.is_some() || t.closed_at.is_some())
        .collect();
    if finished.is_empty() {
        return None;
    }
    let met = finished
        .iter()
        .filter(|t| met_resolution_target(t, now))
        .count();
    Some(round2(met as f64 * 100.0 / finished.len() as f64))
}

/// Active tickets per handler; handlers with nothing assigned still appear.
pub fn handler_workload(tickets: &[Ticket], handlers: &[UserSummary]) -> Vec<HandlerWorkload> {
    let mut rows: Vec<HandlerWorkload> = handlers
        .iter()
        .map(|h| {
            let mine = |status: TicketStatus| {
                tickets
                    .iter()
                    .filter(|t| t.assignee_id == Some(h.id) && t.status == status)
                    .count() as i64
            };
            let open = mine(TicketStatus::Open);
            let in_progress = mine(TicketStatus::InProgress);
            let pending = mine(TicketStatus::Pending);
            HandlerWorkload {
                user_id: h.id,
                full_name: h.full_name.clone(),
                open,
                in_progress,
                pending,
                total: open + in_progress + pending,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.full_name.cmp(&b.full_name)));
    rows
}

pub fn count_overdue(tickets: &[Ticket], now: DateTime<Utc>) -> i64 {
    tickets.iter().filter(|t| t.is_overdue(now)).count() as i64
}

pub fn count_first_response_breaches(tickets: &[Ticket], sla: &SlaConfig, now: DateTime<Utc>) -> i64 {
    tickets
        .iter()
        .filter(|t| first_response_breached(sla, t, now))
        .count() as i64
}

fn in_range(at: DateTime<Utc>, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    at >= from && at < to
}

/// Report over `[from, to)`. `tickets` may contain rows outside the range.
pub fn summarize(
    tickets: &[Ticket],
    categories: &[Category],
    sla: &SlaConfig,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    now: DateTime<Utc>,
) -> TicketReport {
    let created: Vec<Ticket> = tickets
        .iter()
        .filter(|t| in_range(t.created_at, from, to))
        .cloned()
        .collect();
    let resolved: Vec<Ticket> = tickets
        .iter()
        .filter(|t| t.resolved_at.map_or(false, |at| in_range(at, from, to)))
        .cloned()
        .collect();

    TicketReport {
        from,
        to,
        created: created.len() as i64,
        resolved: resolved.len() as i64,
        avg_first_response_hours: average_first_response_hours(&created),
        avg_resolution_hours: average_resolution_hours(&resolved),
        sla_met_percentage: sla_met_percentage(&resolved, now),
        first_response_breaches: count_first_response_breaches(&created, sla, now),
        by_category: count_by_category(&created, categories),
        by_priority: count_by_priority(&created),
    }
}

fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>, DashboardsError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        DashboardsError::Validation(format!(
            "Invalid date '{}', expected YYYY-MM-DD or RFC 3339",
            value
        ))
    })?;
    let date = if end_of_day {
        date.succ_opt().unwrap_or(date)
    } else {
        date
    };
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DashboardsError::Validation(format!("Invalid date '{}'", value)))
}

/// Resolve `from`/`to` query values. A bare `to` date includes that whole day.
pub fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), DashboardsError> {
    let to = match to.map(str::trim).filter(|s| !s.is_empty()) {
        Some(v) => parse_bound(v, true)?,
        None => now,
    };
    let from = match from.map(str::trim).filter(|s| !s.is_empty()) {
        Some(v) => parse_bound(v, false)?,
        None => to - Duration::days(DEFAULT_REPORT_DAYS),
    };
    if from >= to {
        return Err(DashboardsError::Validation(
            "'from' must be before 'to'".to_string(),
        ));
    }
    Ok((from, to))
}
