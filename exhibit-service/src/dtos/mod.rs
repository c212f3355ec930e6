pub mod exhibits;
pub mod users;

pub use exhibits::*;
pub use users::*;
