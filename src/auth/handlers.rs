use axum::{
    extract::{FromRef, Path, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use super::{
    dto::{ForgotPasswordRequest, LoginRequest, NewPassword, SignupRequest, UpdatePasswordRequest},
    extractors::CurrentUser,
    gate::TOKEN_COOKIE,
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_password_blocking},
    repo_types::{NewUser, User},
    reset,
    services::{validate_new_password, validate_signup},
};
use crate::{
    envelope,
    error::{AppError, Result},
    http::is_https,
    state::AppState,
};

const LOGGED_OUT: &str = "loggedout";
const LOGOUT_COOKIE_SECS: i64 = 10;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/users/forgotPassword", post(forgot_password))
        .route("/users/resetPassword/:token", patch(reset_password))
        .route("/users/updateMyPassword", patch(update_my_password))
}

fn session_cookie(value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!("{TOKEN_COOKIE}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Signs a token for `user`, sets it as the session cookie and returns it in
/// the body as well.
fn create_send_token(
    state: &AppState,
    user: &User,
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<Response> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.issue(user.id)?;
    let max_age = state.config.jwt.cookie_ttl_days * 24 * 60 * 60;
    let cookie = session_cookie(&token, max_age, is_https(headers));
    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": user },
    });
    Ok((status, [(SET_COOKIE, cookie)], Json(body)).into_response())
}

#[instrument(skip(state, headers, payload))]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SignupRequest>,
) -> Result<Response> {
    let input = validate_signup(payload)?;

    if state.users.find_by_email(&input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password_blocking(input.password, state.config.password_hash).await?;
    let user = state
        .users
        .create(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .await?;

    let url = format!("{}/me", state.config.public_base_url);
    if let Err(e) = state.mailer.send_welcome(&user.email, &user.name, &url).await {
        error!(error = %e, user_id = %user.id, "welcome email failed");
    }

    info!(user_id = %user.id, email = %user.email, "user registered");
    create_send_token(&state, &user, StatusCode::CREATED, &headers)
}

#[instrument(skip(state, headers, payload))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(email), Some(password)) = (non_empty(payload.email), non_empty(payload.password))
    else {
        return Err(AppError::BadRequest("Please provide email and password!".into()));
    };
    let email = email.trim().to_lowercase();

    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_password_blocking(password, state.decoy_hash.to_string()).await?;
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    create_send_token(&state, &user, StatusCode::OK, &headers)
}

pub async fn logout(headers: HeaderMap) -> impl IntoResponse {
    let cookie = session_cookie(LOGGED_OUT, LOGOUT_COOKIE_SECS, is_https(&headers));
    (
        StatusCode::OK,
        [(SET_COOKIE, cookie)],
        Json(json!({ "status": "success" })),
    )
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email address.".into()))?;

    let token = reset::generate(OffsetDateTime::now_utc());
    state
        .users
        .set_reset_token(user.id, Some((token.hash.clone(), token.expires_at)))
        .await?;

    let url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config.public_base_url,
        token.plain
    );
    if let Err(e) = state
        .mailer
        .send_password_reset(&user.email, &user.name, &url)
        .await
    {
        error!(error = %e, user_id = %user.id, "reset email failed, clearing token");
        state.users.set_reset_token(user.id, None).await?;
        return Err(AppError::Unavailable(
            "There was an error sending the email. Try again later!".into(),
        ));
    }

    info!(user_id = %user.id, "password reset token sent");
    Ok(envelope::message("Token sent to email!"))
}

#[instrument(skip(state, headers, token, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(token): Path<String>,
    Json(payload): Json<NewPassword>,
) -> Result<Response> {
    let now = OffsetDateTime::now_utc();
    let user = state
        .users
        .find_by_reset_token(&reset::hash_token(&token), now)
        .await?
        .ok_or_else(|| {
            warn!("reset with unknown or expired token");
            AppError::InvalidOrExpiredResetToken
        })?;

    let password = validate_new_password(payload)?;
    let password_hash = hash_password_blocking(password, state.config.password_hash).await?;
    state
        .users
        .set_password(user.id, &password_hash, OffsetDateTime::now_utc())
        .await?;
    let user = state.users.find_by_id(user.id).await?.unwrap_or(user);

    info!(user_id = %user.id, "password reset");
    create_send_token(&state, &user, StatusCode::OK, &headers)
}

#[instrument(skip(state, headers, user, payload), fields(user_id = %user.id))]
pub async fn update_my_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Response> {
    let current = payload
        .password_current
        .ok_or_else(|| AppError::BadRequest("Please provide your current password".into()))?;
    if !verify_password_blocking(current, user.password_hash.clone()).await? {
        warn!("wrong current password");
        return Err(AppError::WrongCurrentPassword);
    }

    let password = validate_new_password(payload.new)?;
    let password_hash = hash_password_blocking(password, state.config.password_hash).await?;
    state
        .users
        .set_password(user.id, &password_hash, OffsetDateTime::now_utc())
        .await?;
    let user = state.users.find_by_id(user.id).await?.unwrap_or(user);

    info!("password changed");
    create_send_token(&state, &user, StatusCode::OK, &headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_http_only_and_secure_only_over_https() {
        let plain = session_cookie("abc", 60, false);
        assert_eq!(plain, "jwt=abc; Path=/; Max-Age=60; HttpOnly");
        assert!(session_cookie("abc", 60, true).ends_with("; Secure"));
    }
}
