pub mod filename;
pub mod password;
