pub mod auth_api;
pub mod cors;
pub mod jwt;
pub mod password;

pub use auth_api::{
    admin_only_middleware, auth_middleware, AuthConfig, AuthError, AuthenticatedUser, Permission,
};
pub use cors::create_cors_layer;
pub use jwt::{Claims, IssuedToken, JwtManager};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordIssue};
