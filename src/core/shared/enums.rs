//! Database enum types for the helpdesk schema.
//!
//! Every enum is stored as a `SMALLINT` column and maps to a Rust enum with
//! explicit discriminants. The discriminants are part of the schema: never
//! renumber an existing variant.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::SmallInt;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;

// ============================================================================
// USER ROLE
// ============================================================================

/// Role of a helpdesk account
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum UserRole {
    Student = 0,
    Lecturer = 1,
    Staff = 2,
    Admin = 3,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Student
    }
}

impl UserRole {
    /// Students and lecturers submit tickets; they never handle them.
    pub fn is_requester(&self) -> bool {
        matches!(self, Self::Student | Self::Lecturer)
    }

    /// Staff and admins can be assigned tickets.
    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl ToSql<SmallInt, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for UserRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Student),
            1 => Ok(Self::Lecturer),
            2 => Ok(Self::Staff),
            3 => Ok(Self::Admin),
            _ => Err(format!("Unknown UserRole: {}", value).into()),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Student => write!(f, "student"),
            Self::Lecturer => write!(f, "lecturer"),
            Self::Staff => write!(f, "staff"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" | "mahasiswa" => Ok(Self::Student),
            "lecturer" | "dosen" => Ok(Self::Lecturer),
            "staff" => Ok(Self::Staff),
            "admin" | "administrator" => Ok(Self::Admin),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

// ============================================================================
// TICKET STATUS
// ============================================================================

/// Lifecycle state of a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum TicketStatus {
    Open = 0,
    InProgress = 1,
    Pending = 2,
    Resolved = 3,
    Closed = 4,
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Pending,
        Self::Resolved,
        Self::Closed,
    ];

    /// Statuses that still count against the SLA.
    pub const ACTIVE: [TicketStatus; 3] = [Self::Open, Self::InProgress, Self::Pending];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | Pending | Resolved | Closed)
                | (InProgress, Open | Pending | Resolved | Closed)
                | (Pending, InProgress | Resolved | Closed)
                | (Resolved, Open | Closed)
                | (Closed, Open)
        )
    }
}

impl ToSql<SmallInt, Pg> for TicketStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for TicketStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Open),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Pending),
            3 => Ok(Self::Resolved),
            4 => Ok(Self::Closed),
            _ => Err(format!("Unknown TicketStatus: {}", value).into()),
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Pending => write!(f, "pending"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "inprogress" | "in-progress" => Ok(Self::InProgress),
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

// ============================================================================
// TICKET PRIORITY
// ============================================================================

/// Ticket priority, ordered from least to most urgent
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum TicketPriority {
    Low = 0,
    Medium = 1,
    High = 2,
    Urgent = 3,
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    /// Next level up, or `None` when already urgent.
    pub fn next(&self) -> Option<TicketPriority> {
        match self {
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => Some(Self::Urgent),
            Self::Urgent => None,
        }
    }
}

impl ToSql<SmallInt, Pg> for TicketPriority {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for TicketPriority {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            3 => Ok(Self::Urgent),
            _ => Err(format!("Unknown TicketPriority: {}", value).into()),
        }
    }
}

impl std::fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" | "critical" => Ok(Self::Urgent),
            _ => Err(format!("Unknown ticket priority: {}", s)),
        }
    }
}

// ============================================================================
// DISPOSITION ACTION
// ============================================================================

/// Disposisi: how a ticket moves between handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum DispositionAction {
    Forward = 0,
    Escalate = 1,
    Return = 2,
}

impl ToSql<SmallInt, Pg> for DispositionAction {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for DispositionAction {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::Forward),
            1 => Ok(Self::Escalate),
            2 => Ok(Self::Return),
            _ => Err(format!("Unknown DispositionAction: {}", value).into()),
        }
    }
}

impl std::fmt::Display for DispositionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Escalate => write!(f, "escalate"),
            Self::Return => write!(f, "return"),
        }
    }
}

impl std::str::FromStr for DispositionAction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" | "teruskan" => Ok(Self::Forward),
            "escalate" | "eskalasi" => Ok(Self::Escalate),
            "return" | "kembalikan" => Ok(Self::Return),
            _ => Err(format!("Unknown disposition action: {}", s)),
        }
    }
}

// ============================================================================
// NOTIFICATION KIND
// ============================================================================

/// What triggered a notification row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum NotificationKind {
    TicketCreated = 0,
    TicketAssigned = 1,
    StatusChanged = 2,
    NewMessage = 3,
    Disposition = 4,
    SlaBreached = 5,
}

impl ToSql<SmallInt, Pg> for NotificationKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i16;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for NotificationKind {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = i16::from_sql(bytes)?;
        match value {
            0 => Ok(Self::TicketCreated),
            1 => Ok(Self::TicketAssigned),
            2 => Ok(Self::StatusChanged),
            3 => Ok(Self::NewMessage),
            4 => Ok(Self::Disposition),
            5 => Ok(Self::SlaBreached),
            _ => Err(format!("Unknown NotificationKind: {}", value).into()),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TicketCreated => write!(f, "ticket_created"),
            Self::TicketAssigned => write!(f, "ticket_assigned"),
            Self::StatusChanged => write!(f, "status_changed"),
            Self::NewMessage => write!(f, "new_message"),
            Self::Disposition => write!(f, "disposition"),
            Self::SlaBreached => write!(f, "sla_breached"),
        }
    }
}
