//! Request helpers shared by handlers.

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;

/// True when the client connection was TLS, as reported by the proxy in
/// front of us.
pub fn is_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("").trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Path ids arrive as text so a malformed one is a 400 in our envelope, not
/// a framework rejection.
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid id: {raw}")))
}
