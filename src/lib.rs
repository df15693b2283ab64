pub mod approval;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod logger;
pub mod maintenance;
pub mod models;
pub mod router;
pub mod schema;
pub mod state;
