use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::follow_routes())
}
