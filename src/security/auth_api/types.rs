use axum::{extract::FromRequestParts, http::request::Parts};
use std::collections::HashSet;
use uuid::Uuid;

use super::error::AuthError;
use crate::core::shared::enums::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    SubmitTickets,
    ViewTicketQueue,
    HandleTickets,
    PostInternalNotes,
    ClaimTickets,
    AssignTickets,
    DeleteTickets,
    ViewHandlers,
    ManageUsers,
    ManageCategories,
    ViewReports,
}

pub fn role_permissions(role: UserRole) -> HashSet<Permission> {
    match role {
        UserRole::Student | UserRole::Lecturer => {
            let mut perms = HashSet::new();
            perms.insert(Permission::SubmitTickets);
            perms
        }
        UserRole::Staff => {
            let mut perms = role_permissions(UserRole::Student);
            perms.insert(Permission::ViewTicketQueue);
            perms.insert(Permission::HandleTickets);
            perms.insert(Permission::PostInternalNotes);
            perms.insert(Permission::ClaimTickets);
            perms.insert(Permission::ViewHandlers);
            perms
        }
        UserRole::Admin => {
            let mut perms = role_permissions(UserRole::Staff);
            perms.insert(Permission::AssignTickets);
            perms.insert(Permission::DeleteTickets);
            perms.insert(Permission::ManageUsers);
            perms.insert(Permission::ManageCategories);
            perms.insert(Permission::ViewReports);
            perms
        }
    }
}

/// Caller identity attached to every request by `auth_middleware`.
///
/// Used as a handler argument it rejects anonymous callers with 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

impl Default for AuthenticatedUser {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid, email: impl Into<String>, full_name: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id,
            email: email.into(),
            full_name: full_name.into(),
            role,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: Uuid::nil(),
            email: String::new(),
            full_name: "anonymous".to_string(),
            role: UserRole::Student,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_nil()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.role.is_admin()
    }

    pub fn is_handler(&self) -> bool {
        self.is_authenticated() && self.role.is_handler()
    }

    pub fn is_requester(&self) -> bool {
        self.role.is_requester()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_authenticated() && role_permissions(self.role).contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AuthError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .filter(|user| user.is_authenticated())
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
