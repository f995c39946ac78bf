use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::directory::provisioning::{
    count_active_admins, create_user, normalize_email, validate_account, validate_new_password,
    UserAccount,
};
use crate::core::shared::enums::UserRole;
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{User, UserSummary};
use crate::core::shared::schema::users;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{normalize_optional, with_conn, DbConn};
use crate::security::auth_api::{admin_only_middleware, AuthError, AuthenticatedUser, Permission};
use crate::security::password::{hash_password, verify_password};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Roles a visitor may pick when registering.
pub fn ensure_self_service_role(role: Option<UserRole>) -> DeskResult<UserRole> {
    match role.unwrap_or(UserRole::Student) {
        r @ (UserRole::Student | UserRole::Lecturer) => Ok(r),
        _ => Err(DeskError::Forbidden(
            "Staff and administrator accounts are created by an administrator".to_string(),
        )),
    }
}

fn load_user(conn: &mut DbConn, id: Uuid) -> DeskResult<User> {
    users::table
        .find(id)
        .first::<User>(conn)
        .optional()?
        .ok_or_else(|| DeskError::not_found("User"))
}

/// Demoting or deactivating the last active admin would lock everyone out.
fn ensure_not_last_admin(conn: &mut DbConn, target: &User) -> DeskResult<()> {
    if target.role == UserRole::Admin && target.is_active && count_active_admins(conn)? <= 1 {
        return Err(DeskError::conflict(
            "At least one active administrator must remain",
        ));
    }
    Ok(())
}

pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserAccount>,
) -> Result<(StatusCode, Json<User>), DeskError> {
    let role = ensure_self_service_role(req.role)?;
    let account = validate_account(&req, role)?;

    let user = with_conn(&state.conn, move |conn| create_user(conn, account)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, DeskError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(DeskError::validation("Email and password are required"));
    }

    let user = with_conn(&state.conn, move |conn| {
        let user: User = users::table
            .filter(users::email.eq(&email))
            .first(conn)
            .optional()?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled.into());
        }

        let now = Utc::now();
        Ok(diesel::update(users::table.find(user.id))
            .set(users::last_login_at.eq(Some(now)))
            .get_result::<User>(conn)?)
    })
    .await?;

    let issued = state
        .jwt
        .issue(user.id, &user.email, &user.full_name, user.role)?;
    log::info!("User {} logged in", user.email);

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        user,
    }))
}

pub async fn handle_me(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<User>, DeskError> {
    let me = with_conn(&state.conn, move |conn| {
        let me = load_user(conn, user.user_id)?;
        if !me.is_active {
            return Err(AuthError::AccountDisabled.into());
        }
        Ok(me)
    })
    .await?;
    Ok(Json(me))
}

pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, DeskError> {
    validate_new_password(&req.new_password)?;
    if req.new_password == req.current_password {
        return Err(DeskError::validation(
            "New password must differ from the current one",
        ));
    }

    with_conn(&state.conn, move |conn| {
        let me = load_user(conn, user.user_id)?;
        if !verify_password(&req.current_password, &me.password_hash)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        diesel::update(users::table.find(me.id))
            .set((
                users::password_hash.eq(hash_password(&req.new_password)?),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, DeskError> {
    user.require(Permission::ManageUsers)?;
    let role = normalize_optional(query.role)
        .map(|r| UserRole::from_str(&r))
        .transpose()
        .map_err(DeskError::Validation)?;
    let search = normalize_optional(query.search);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let rows = with_conn(&state.conn, move |conn| {
        let mut q = users::table.into_boxed();
        if let Some(role) = role {
            q = q.filter(users::role.eq(role));
        }
        if let Some(active) = query.is_active {
            q = q.filter(users::is_active.eq(active));
        }
        if let Some(search) = search {
            let pattern = format!("%{search}%");
            q = q.filter(
                users::email
                    .ilike(pattern.clone())
                    .or(users::full_name.ilike(pattern.clone()))
                    .or(users::identity_number.ilike(pattern)),
            );
        }
        Ok(q
            .order(users::full_name.asc())
            .limit(limit)
            .offset(offset)
            .load::<User>(conn)?)
    })
    .await?;

    Ok(Json(rows))
}

pub async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<UserAccount>,
) -> Result<(StatusCode, Json<User>), DeskError> {
    user.require(Permission::ManageUsers)?;
    let account = validate_account(&req, UserRole::Student)?;

    let created = with_conn(&state.conn, move |conn| create_user(conn, account)).await?;
    log::info!("{} created account {}", user.email, created.email);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Active staff and admins, the possible assignees and disposition targets.
pub async fn handle_list_handlers(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<UserSummary>>, DeskError> {
    user.require(Permission::ViewHandlers)?;

    let rows = with_conn(&state.conn, move |conn| {
        Ok(users::table
            .filter(users::is_active.eq(true))
            .filter(users::role.eq_any(vec![UserRole::Staff, UserRole::Admin]))
            .order(users::full_name.asc())
            .select(UserSummary::as_select())
            .load(conn)?)
    })
    .await?;

    Ok(Json(rows))
}

pub async fn handle_set_role(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<User>, DeskError> {
    user.require(Permission::ManageUsers)?;
    if id == user.user_id && req.role != user.role {
        return Err(DeskError::conflict("You cannot change your own role"));
    }

    let updated = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, DeskError, _>(|conn| {
            let target = load_user(conn, id)?;
            if target.role == req.role {
                return Ok(target);
            }
            if req.role != UserRole::Admin {
                ensure_not_last_admin(conn, &target)?;
            }
            Ok(diesel::update(users::table.find(id))
                .set((users::role.eq(req.role), users::updated_at.eq(Utc::now())))
                .get_result::<User>(conn)?)
        })
    })
    .await?;

    log::info!("{} set role of {} to {}", user.email, updated.email, updated.role);
    Ok(Json(updated))
}

pub async fn handle_set_active(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<User>, DeskError> {
    user.require(Permission::ManageUsers)?;
    if id == user.user_id && !req.is_active {
        return Err(DeskError::conflict("You cannot deactivate your own account"));
    }

    let updated = with_conn(&state.conn, move |conn| {
        conn.transaction::<_, DeskError, _>(|conn| {
            let target = load_user(conn, id)?;
            if target.is_active == req.is_active {
                return Ok(target);
            }
            if !req.is_active {
                ensure_not_last_admin(conn, &target)?;
            }
            Ok(diesel::update(users::table.find(id))
                .set((
                    users::is_active.eq(req.is_active),
                    users::updated_at.eq(Utc::now()),
                ))
                .get_result::<User>(conn)?)
        })
    })
    .await?;

    Ok(Json(updated))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(handle_register))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/me", get(handle_me))
        .route("/api/auth/password", put(handle_change_password))
}

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/api/users", get(handle_list_users).post(handle_create_user))
        .route("/api/users/:id/role", put(handle_set_role))
        .route("/api/users/:id/active", put(handle_set_active))
        .route_layer(middleware::from_fn(admin_only_middleware));

    Router::new()
        .route("/api/users/handlers", get(handle_list_handlers))
        .merge(admin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_service_roles() {
        assert_eq!(ensure_self_service_role(None).unwrap(), UserRole::Student);
        assert_eq!(
            ensure_self_service_role(Some(UserRole::Lecturer)).unwrap(),
            UserRole::Lecturer
        );
        assert!(matches!(
            ensure_self_service_role(Some(UserRole::Staff)),
            Err(DeskError::Forbidden(_))
        ));
        assert!(ensure_self_service_role(Some(UserRole::Admin)).is_err());
    }
}
