pub mod enums;
pub mod error;
pub mod models;
pub mod schema;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod utils;

pub use enums::*;
pub use error::{DeskError, DeskResult};
pub use models::*;

pub use utils::{
    create_conn, create_lazy_conn, format_ticket_number, normalize_optional, run_migrations,
    sanitize_file_name, with_conn, DbConn, DbPool,
};
