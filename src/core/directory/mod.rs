//! Accounts: registration, login and user administration.

pub mod api;
pub mod provisioning;

pub use api::{configure_auth_routes, configure_users_routes, LoginRequest, LoginResponse};
pub use provisioning::{UserAccount, UserProvisioningService};
