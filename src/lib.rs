pub mod categories;
pub mod core;
pub mod dashboards;
pub mod main_module;
pub mod notifications;
pub mod security;
pub mod tickets;

pub use crate::core::shared;
pub use main_module::{build_router, run_server};
