pub mod dto;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub use dto::Review;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::review_routes())
}
