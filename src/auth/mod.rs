use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod gate;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod reset;
pub mod services;

pub use extractors::{
    AdminOnly, AdminOrLeadGuide, CurrentUser, RequireRole, UserOnly, UserOrAdmin,
};
pub use repo_types::{Role, User};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
