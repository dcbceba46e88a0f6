pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod forum;
pub mod guard;
pub mod ledger;
pub mod models;
pub mod moderation;
pub mod notify;
pub mod openapi;
pub mod posts;
pub mod repo;
pub mod routes;
pub mod users;

// Re-export commonly used items for tests / external users
pub use forum::Forum;
pub use routes::{config, AppState};
