//! Process-level pieces: health endpoints, router assembly and shutdown.

mod health;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
