pub mod dto;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub use dto::Booking;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::booking_routes())
}
