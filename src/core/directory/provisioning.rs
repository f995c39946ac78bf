use anyhow::Context;
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use uuid::Uuid;

use crate::core::config::BootstrapAdminConfig;
use crate::core::shared::enums::UserRole;
use crate::core::shared::error::{DeskError, DeskResult};
use crate::core::shared::models::User;
use crate::core::shared::schema::users;
use crate::core::shared::utils::{normalize_optional, with_conn, DbConn, DbPool};
use crate::security::password::{hash_password, validate_password_strength};

const NAME_MAX_CHARS: usize = 150;

/// Input for a new account, from self-registration or an administrator.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    pub identity_number: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> DeskResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DeskError::validation("A valid email address is required"))
    }
}

pub fn validate_new_password(password: &str) -> DeskResult<()> {
    let issues = validate_password_strength(password);
    if issues.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = issues.iter().map(|i| i.message()).collect();
    Err(DeskError::Validation(messages.join("; ")))
}

/// Checks everything that does not need the database. `default_role` applies
/// when the account does not name one.
pub fn validate_account(account: &UserAccount, default_role: UserRole) -> DeskResult<UserAccount> {
    let email = normalize_email(&account.email);
    validate_email(&email)?;

    let full_name = account.full_name.trim().to_string();
    if full_name.is_empty() || full_name.chars().count() > NAME_MAX_CHARS {
        return Err(DeskError::validation(format!(
            "Full name must be between 1 and {} characters",
            NAME_MAX_CHARS
        )));
    }
    validate_new_password(&account.password)?;

    Ok(UserAccount {
        email,
        password: account.password.clone(),
        full_name,
        role: Some(account.role.unwrap_or(default_role)),
        identity_number: normalize_optional(account.identity_number.clone()),
        department: normalize_optional(account.department.clone()),
        phone: normalize_optional(account.phone.clone()),
    })
}

/// Insert a validated account. Duplicate emails are a conflict.
pub fn create_user(conn: &mut DbConn, account: UserAccount) -> DeskResult<User> {
    let taken: i64 = users::table
        .filter(users::email.eq(&account.email))
        .count()
        .get_result(conn)?;
    if taken > 0 {
        return Err(DeskError::conflict("Email is already registered"));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: account.email,
        password_hash: hash_password(&account.password)?,
        full_name: account.full_name,
        role: account.role.unwrap_or_default(),
        identity_number: account.identity_number,
        department: account.department,
        phone: account.phone,
        is_active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(users::table)
        .values(&user)
        .execute(conn)?;
    log::info!("Provisioned {} account {}", user.role, user.email);
    Ok(user)
}

pub fn count_active_admins(conn: &mut DbConn) -> DeskResult<i64> {
    Ok(users::table
        .filter(users::role.eq(UserRole::Admin))
        .filter(users::is_active.eq(true))
        .count()
        .get_result(conn)?)
}

/// Creates accounts against the pool outside of a request.
pub struct UserProvisioningService {
    pool: DbPool,
}

impl UserProvisioningService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn provision_user(&self, account: UserAccount) -> DeskResult<User> {
        let account = validate_account(&account, UserRole::Student)?;
        with_conn(&self.pool, move |conn| create_user(conn, account)).await
    }

    /// Create the configured administrator when no active admin exists.
    /// Returns whether an account was created.
    pub async fn ensure_bootstrap_admin(
        &self,
        config: &BootstrapAdminConfig,
    ) -> anyhow::Result<bool> {
        let admins = with_conn(&self.pool, count_active_admins)
            .await
            .context("Failed to count administrators")?;
        if admins > 0 {
            log::debug!("Bootstrap admin skipped, {} active admin(s) present", admins);
            return Ok(false);
        }

        let account = UserAccount {
            email: config.email.clone(),
            password: config.password.clone(),
            full_name: config.full_name.clone(),
            role: Some(UserRole::Admin),
            identity_number: None,
            department: None,
            phone: None,
        };
        let user = self
            .provision_user(account)
            .await
            .context("Failed to create bootstrap administrator")?;
        log::info!("Created bootstrap administrator {}", user.email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(email: &str, password: &str) -> UserAccount {
        UserAccount {
            email: email.to_string(),
            password: password.to_string(),
            full_name: " Siti Rahma ".to_string(),
            role: None,
            identity_number: Some(" 2101001 ".to_string()),
            department: Some("   ".to_string()),
            phone: None,
        }
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("siti@campus.ac.id").is_ok());
        assert!(validate_email("siti@campus").is_err());
        assert!(validate_email("@campus.ac.id").is_err());
        assert!(validate_email("si ti@campus.ac.id").is_err());
        assert!(validate_email("siti.campus.ac.id").is_err());
    }

    #[test]
    fn test_validate_account_normalizes() {
        let valid = validate_account(&account(" Siti@Campus.AC.ID ", "kopi1234"), UserRole::Student)
            .unwrap();
        assert_eq!(valid.email, "siti@campus.ac.id");
        assert_eq!(valid.full_name, "Siti Rahma");
        assert_eq!(valid.role, Some(UserRole::Student));
        assert_eq!(valid.identity_number.as_deref(), Some("2101001"));
        assert_eq!(valid.department, None);
    }

    #[test]
    fn test_weak_password_rejected_with_all_issues() {
        let err = validate_account(&account("a@b.id", "short"), UserRole::Student).unwrap_err();
        match err {
            DeskError::Validation(msg) => {
                assert!(msg.contains("at least 8"));
                assert!(msg.contains("digit"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_explicit_role_is_kept() {
        let mut acc = account("staff@campus.ac.id", "helpdesk42");
        acc.role = Some(UserRole::Staff);
        let valid = validate_account(&acc, UserRole::Student).unwrap();
        assert_eq!(valid.role, Some(UserRole::Staff));
    }
}
