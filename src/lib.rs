pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod extract;
pub mod follows;
pub mod mail;
pub mod memory;
pub mod posts;
pub mod state;
pub mod users;
pub mod validation;
