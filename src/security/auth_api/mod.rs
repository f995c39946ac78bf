//! Bearer-token authentication and role-based authorization.
//!
//! `auth_middleware` resolves the caller from the JWT and stores an
//! [`AuthenticatedUser`] in the request extensions; handlers take it as an
//! extractor and check [`Permission`]s or ticket-level access themselves.

pub mod config;
pub mod error;
pub mod middleware;
pub mod tests;
pub mod types;
pub mod utils;

pub use config::AuthConfig;
pub use error::AuthError;
pub use middleware::{admin_only_middleware, auth_middleware};
pub use types::{role_permissions, AuthenticatedUser, Permission};
pub use utils::{extract_bearer_token, extract_user_from_request, is_jwt_format};
