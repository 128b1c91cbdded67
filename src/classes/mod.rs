use crate::auth::jwt::JwtKeys;
use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(keys: JwtKeys) -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes(keys.clone()))
        .merge(handlers::admin_routes(keys.clone()))
        .merge(handlers::enrollment_routes(keys))
}
