pub mod cache;
pub mod config;
pub mod database;
pub mod logging;
pub mod media;
pub mod security;
pub mod templates;
