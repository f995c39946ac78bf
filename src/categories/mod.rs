//! Ticket categories and subcategories.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::enums::UserRole;
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::{Category, Subcategory};
use crate::core::shared::schema::{categories, subcategories, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{normalize_optional, with_conn, DbConn};
use crate::security::auth_api::{AuthenticatedUser, Permission};

const NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub default_assignee_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_assignee_id: Option<Uuid>,
    #[serde(default)]
    pub clear_default_assignee: bool,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubcategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryWithSubcategories {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<Subcategory>,
}

pub fn validate_name(name: &str) -> DeskResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DeskError::validation("Name is required"));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(DeskError::validation(format!(
            "Name cannot exceed {} characters",
            NAME_MAX_CHARS
        )));
    }
    Ok(name.to_string())
}

/// Pair each category with its subcategories, keeping the category order.
pub fn group_subcategories(
    categories: Vec<Category>,
    subcategories: Vec<Subcategory>,
) -> Vec<CategoryWithSubcategories> {
    categories
        .into_iter()
        .map(|category| {
            let subs = subcategories
                .iter()
                .filter(|s| s.category_id == category.id)
                .cloned()
                .collect();
            CategoryWithSubcategories {
                category,
                subcategories: subs,
            }
        })
        .collect()
}

fn ensure_default_assignee(conn: &mut DbConn, id: Uuid) -> DeskResult<()> {
    let exists: i64 = users::table
        .find(id)
        .filter(users::is_active.eq(true))
        .filter(users::role.eq_any(vec![UserRole::Staff, UserRole::Admin]))
        .count()
        .get_result(conn)?;
    if exists == 0 {
        return Err(DeskError::validation(
            "Default assignee must be an active staff member or administrator",
        ));
    }
    Ok(())
}

fn load_category(conn: &mut DbConn, id: Uuid) -> DeskResult<Category> {
    categories::table
        .find(id)
        .first::<Category>(conn)
        .optional()?
        .ok_or_else(|| DeskError::not_found("Category"))
}

pub async fn handle_list_categories(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CategoryWithSubcategories>>, DeskError> {
    let rows = with_conn(&state.conn, move |conn| {
        let cats: Vec<Category> = categories::table
            .filter(categories::is_active.eq(true))
            .order((categories::sort_order.asc(), categories::name.asc()))
            .load(conn)?;
        let ids: Vec<Uuid> = cats.iter().map(|c| c.id).collect();
        let subs: Vec<Subcategory> = subcategories::table
            .filter(subcategories::category_id.eq_any(ids))
            .filter(subcategories::is_active.eq(true))
            .order(subcategories::name.asc())
            .load(conn)?;
        Ok(group_subcategories(cats, subs))
    })
    .await?;

    Ok(Json(rows))
}

pub async fn handle_create_category(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), DeskError> {
    user.require(Permission::ManageCategories)?;
    let name = validate_name(&req.name)?;

    let category = with_conn(&state.conn, move |conn| {
        if let Some(assignee) = req.default_assignee_id {
            ensure_default_assignee(conn, assignee)?;
        }

        let max_order: Option<i32> = categories::table
            .select(diesel::dsl::max(categories::sort_order))
            .first(conn)?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name,
            description: normalize_optional(req.description),
            default_assignee_id: req.default_assignee_id,
            sort_order: max_order.unwrap_or(0) + 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(categories::table)
            .values(&category)
            .execute(conn)?;
        info!("Category {} created by {}", category.name, user.user_id);
        Ok(category)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn handle_update_category(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, DeskError> {
    user.require(Permission::ManageCategories)?;
    let name = req.name.as_deref().map(validate_name).transpose()?;

    let category = with_conn(&state.conn, move |conn| {
        let mut category = load_category(conn, id)?;

        if let Some(name) = name {
            category.name = name;
        }
        if req.description.is_some() {
            category.description = normalize_optional(req.description);
        }
        if req.clear_default_assignee {
            category.default_assignee_id = None;
        } else if let Some(assignee) = req.default_assignee_id {
            ensure_default_assignee(conn, assignee)?;
            category.default_assignee_id = Some(assignee);
        }
        if let Some(order) = req.sort_order {
            category.sort_order = order;
        }

        Ok(diesel::update(categories::table.find(id))
            .set((
                categories::name.eq(&category.name),
                categories::description.eq(&category.description),
                categories::default_assignee_id.eq(category.default_assignee_id),
                categories::sort_order.eq(category.sort_order),
                categories::updated_at.eq(Utc::now()),
            ))
            .get_result::<Category>(conn)?)
    })
    .await?;

    Ok(Json(category))
}

/// Categories are deactivated, never removed; tickets keep pointing at them.
pub async fn handle_deactivate_category(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, DeskError> {
    user.require(Permission::ManageCategories)?;

    with_conn(&state.conn, move |conn| {
        load_category(conn, id)?;
        diesel::update(categories::table.find(id))
            .set((
                categories::is_active.eq(false),
                categories::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        info!("Category {} deactivated by {}", id, user.user_id);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_create_subcategory(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(category_id): Path<Uuid>,
    Json(req): Json<CreateSubcategoryRequest>,
) -> Result<(StatusCode, Json<Subcategory>), DeskError> {
    user.require(Permission::ManageCategories)?;
    let name = validate_name(&req.name)?;

    let sub = with_conn(&state.conn, move |conn| {
        let category = load_category(conn, category_id)?;
        if !category.is_active {
            return Err(DeskError::conflict("Category is inactive"));
        }

        let now = Utc::now();
        let sub = Subcategory {
            id: Uuid::new_v4(),
            category_id: category.id,
            name,
            description: normalize_optional(req.description),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(subcategories::table)
            .values(&sub)
            .execute(conn)?;
        Ok(sub)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(sub)))
}

pub async fn handle_delete_subcategory(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, DeskError> {
    user.require(Permission::ManageCategories)?;

    with_conn(&state.conn, move |conn| {
        let updated = diesel::update(subcategories::table.find(id))
            .set((
                subcategories::is_active.eq(false),
                subcategories::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        if updated == 0 {
            return Err(DeskError::not_found("Subcategory"));
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_categories_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/categories",
            get(handle_list_categories).post(handle_create_category),
        )
        .route(
            "/api/categories/:id",
            put(handle_update_category).delete(handle_deactivate_category),
        )
        .route(
            "/api/categories/:id/subcategories",
            post(handle_create_subcategory),
        )
        .route("/api/subcategories/:id", delete(handle_delete_subcategory))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, order: i32) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            default_assignee_id: None,
            sort_order: order,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn sub(category_id: Uuid, name: &str) -> Subcategory {
        let now = Utc::now();
        Subcategory {
            id: Uuid::new_v4(),
            category_id,
            name: name.to_string(),
            description: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_group_subcategories() {
        let network = category("Network", 1);
        let academic = category("Academic", 2);
        let subs = vec![
            sub(academic.id, "Transcript"),
            sub(network.id, "Wi-Fi"),
            sub(network.id, "VPN"),
        ];

        let grouped = group_subcategories(vec![network.clone(), academic.clone()], subs);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].category.id, network.id);
        assert_eq!(grouped[0].subcategories.len(), 2);
        assert_eq!(grouped[1].subcategories[0].name, "Transcript");
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Network ").unwrap(), "Network");
        assert!(validate_name(" ").is_err());
        assert!(validate_name(&"n".repeat(101)).is_err());
    }
}
