//! Request authentication and role checks.
//!
//! A request moves from "no token" to "token verified" to "principal
//! resolved" to "authorized". Each step either hands over to the next or
//! ends the request with an [`AppError`].

use axum::{extract::FromRef, http::HeaderMap};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::{
    claims::Claims,
    jwt::JwtKeys,
    repo::UserStore,
    repo_types::{Role, User},
};
use crate::{
    error::{AppError, AuthFailure},
    state::AppState,
};

/// A password change less than this far after a token's `iat` does not
/// invalidate it. Covers the gap between stamping `password_changed_at` and
/// signing the replacement token in the same request.
pub const CREDENTIAL_SKEW: Duration = Duration::seconds(1);

pub const TOKEN_COOKIE: &str = "jwt";

/// `Authorization: Bearer` wins; the `jwt` cookie is the fallback for
/// browser sessions.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

pub async fn resolve_principal(users: &dyn UserStore, claims: &Claims) -> Result<User, AppError> {
    users
        .find_by_id(claims.sub)
        .await?
        .ok_or(AppError::Unauthenticated(AuthFailure::PrincipalNotFound))
}

/// Rejects tokens issued before the principal's last password change.
pub fn check_credential_freshness(user: &User, issued_at: i64) -> Result<(), AuthFailure> {
    let Some(changed_at) = user.password_changed_at else {
        return Ok(());
    };
    let issued_at =
        OffsetDateTime::from_unix_timestamp(issued_at).map_err(|_| AuthFailure::InvalidToken)?;
    if changed_at > issued_at + CREDENTIAL_SKEW {
        return Err(AuthFailure::CredentialsRotated);
    }
    Ok(())
}

pub fn authorize(user: &User, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        warn!(user_id = %user.id, role = ?user.role, "role not permitted");
        Err(AppError::Forbidden)
    }
}

/// Full check of one presented token.
pub async fn authenticate_token(
    keys: &JwtKeys,
    users: &dyn UserStore,
    token: &str,
) -> Result<User, AppError> {
    let claims = keys.verify(token).map_err(|failure| {
        warn!(?failure, "token rejected");
        AppError::Unauthenticated(failure)
    })?;
    let user = resolve_principal(users, &claims).await.map_err(|e| {
        warn!(user_id = %claims.sub, "token for missing or inactive user");
        e
    })?;
    check_credential_freshness(&user, claims.iat).map_err(|failure| {
        warn!(user_id = %user.id, "token predates password change");
        AppError::Unauthenticated(failure)
    })?;
    debug!(user_id = %user.id, "request authenticated");
    Ok(user)
}

/// Guard for protected routes.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token =
        extract_token(headers).ok_or(AppError::Unauthenticated(AuthFailure::NotLoggedIn))?;
    let keys = JwtKeys::from_ref(state);
    authenticate_token(&keys, state.users.as_ref(), &token).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use uuid::Uuid;

    use super::*;

    fn user(role: Role, changed: Option<OffsetDateTime>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "t@example.com".into(),
            photo: "default.jpg".into(),
            role,
            password_hash: String::new(),
            password_changed_at: changed,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn header_token_beats_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer from-header"));
        headers.insert("cookie", HeaderValue::from_static("theme=dark; jwt=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        headers.remove("authorization");
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn no_token_anywhere() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("jwtx=1; other=2"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn never_changed_password_is_fresh() {
        let u = user(Role::User, None);
        assert!(check_credential_freshness(&u, 0).is_ok());
    }

    #[test]
    fn token_issued_before_change_is_stale() {
        let issued = OffsetDateTime::now_utc() - Duration::minutes(5);
        let u = user(Role::User, Some(OffsetDateTime::now_utc()));
        assert_eq!(
            check_credential_freshness(&u, issued.unix_timestamp()),
            Err(AuthFailure::CredentialsRotated)
        );
    }

    #[test]
    fn change_within_skew_keeps_token() {
        let issued = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let within = user(Role::User, Some(issued + Duration::milliseconds(900)));
        assert!(check_credential_freshness(&within, issued.unix_timestamp()).is_ok());

        let beyond = user(Role::User, Some(issued + Duration::milliseconds(1100)));
        assert_eq!(
            check_credential_freshness(&beyond, issued.unix_timestamp()),
            Err(AuthFailure::CredentialsRotated)
        );
    }

    #[test]
    fn token_issued_after_change_is_fresh() {
        let changed = OffsetDateTime::now_utc() - Duration::hours(1);
        let u = user(Role::User, Some(changed));
        let issued = OffsetDateTime::now_utc().unix_timestamp();
        assert!(check_credential_freshness(&u, issued).is_ok());
    }

    #[test]
    fn authorize_is_membership() {
        let allowed = [Role::Admin, Role::LeadGuide];
        for role in Role::ALL {
            let result = authorize(&user(role, None), &allowed);
            if allowed.contains(&role) {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(AppError::Forbidden)));
            }
        }
        assert!(authorize(&user(Role::Admin, None), &[]).is_err());
    }
}
