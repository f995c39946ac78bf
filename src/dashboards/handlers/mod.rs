mod overview;
mod reports;

pub use overview::*;
pub use reports::*;
