//! Groupmarket - a small CRUD service for community groups
//!
//! Groups live in a single PostgreSQL table and are exposed as JSON under
//! `/items`. The binary bootstraps the schema before serving traffic.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;

// Re-export commonly used types
pub use config::Config;
pub use state::AppState;
