pub mod dto;
pub mod handlers;
mod repo;

use crate::state::AppState;
use axum::Router;

pub use dto::Tour;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::tour_routes())
}
