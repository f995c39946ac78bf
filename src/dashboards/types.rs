use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::enums::{TicketPriority, TicketStatus};
use crate::core::shared::models::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TicketStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCount {
    pub priority: TicketPriority,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category_id: Uuid,
    pub name: String,
    pub count: i64,
}

/// Tickets a handler is currently carrying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerWorkload {
    pub user_id: Uuid,
    pub full_name: String,
    pub open: i64,
    pub in_progress: i64,
    pub pending: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequesterDashboard {
    pub by_status: Vec<StatusCount>,
    pub recent: Vec<Ticket>,
    pub unread_notifications: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffDashboard {
    pub assigned_by_status: Vec<StatusCount>,
    pub assigned_overdue: i64,
    pub unassigned_queue: i64,
    pub recent_assigned: Vec<Ticket>,
    pub unread_notifications: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
    pub by_priority: Vec<PriorityCount>,
    pub by_category: Vec<CategoryCount>,
    pub overdue: i64,
    pub first_response_breaches: i64,
    pub unassigned: i64,
    pub avg_resolution_hours: Option<f64>,
    pub workload: Vec<HandlerWorkload>,
    pub unread_notifications: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    Requester(RequesterDashboard),
    Staff(StaffDashboard),
    Admin(AdminDashboard),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub created: i64,
    pub resolved: i64,
    pub avg_first_response_hours: Option<f64>,
    pub avg_resolution_hours: Option<f64>,
    pub sla_met_percentage: Option<f64>,
    /// Tickets created in range whose first reply came late or is still late.
    pub first_response_breaches: i64,
    pub by_category: Vec<CategoryCount>,
    pub by_priority: Vec<PriorityCount>,
}
