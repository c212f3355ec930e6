pub mod admin;
pub mod auth;
pub mod exhibits;
pub mod form;
pub mod health;
pub mod users;
